//! Night City desktop kernel
//!
//! Wires the subsystems together and exposes the capability-checked
//! surface hosted applications run against.
//!
//! ```text
//!                 ┌─────────────────────────── Kernel ───────────────────────────┐
//!   AppHost ────► │ PermissionBroker ──► EventBus ◄── Vfs ◄── MetadataStore       │
//!   (per window)  │        │                ▲   ▲          └── ContentStore        │
//!                 │        ▼                │   │                                  │
//!                 │   grant table      DesktopManager   CrashBoundary (err:*)      │
//!                 │        └──────┬─────────┘                                      │
//!                 │               ▼                                                │
//!                 │        SystemSnapshot ──► SnapshotStore (memory / file)        │
//!                 └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one cooperative event loop (`Rc`, `RefCell`,
//! `?Send` futures). Drive it with a current-thread tokio runtime or a
//! `LocalSet`.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
mod kernel;
pub mod persistence;
pub mod recovery;
pub mod registry;
pub mod storage;

pub use clipboard::Clipboard;
pub use config::{ImportLimits, KernelConfig, ViewportConfig};
pub use error::KernelError;
pub use events::commit_event;
pub use host::{AppHost, HostStatus};
pub use kernel::{Kernel, SystemView, SNAPSHOT_FILE, VFS_DIR};
pub use persistence::{
    validate_bundle, FileSnapshotStore, MemorySnapshotStore, SnapshotStore, SystemSnapshot,
};
pub use recovery::{CrashBoundary, RecoveryAction};
pub use registry::{factory_manifests, AppManifest, AppRegistry, RegistryError, FACTORY_APP_IDS};
pub use storage::AppStorage;

// Subsystem crates, so embedders need a single dependency.
pub use ncos_bus as bus;
pub use ncos_desktop as desktop;
pub use ncos_perm as perm;
pub use ncos_vfs as vfs;
