//! Night City Virtual Filesystem
//!
//! The VFS keeps a tree of [`Node`]s (files, folders and mounts) rooted at
//! `"root"`:
//!
//! - **Types**: `Node`, `NodeKind`, `ExternalHandle`, name validation
//! - **Store**: `MetadataStore` / `ContentStore` traits for the backing stores
//! - **Backends**: `MemoryStore` (tests, ephemeral sessions), `DirStore` (disk)
//! - **Index**: best-effort, in-memory search over names and content excerpts
//! - **Vfs**: the service tying the tree, the stores and the index together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Vfs                               │
//! │  live node map (single writer)   content overlay   index     │
//! └───────────────┬──────────────────────────┬───────────────────┘
//!                 │                          │
//!                 ▼                          ▼
//!   ┌──────────────────────────┐  ┌──────────────────────────┐
//!   │      MetadataStore        │  │       ContentStore        │
//!   │  node id -> Node          │  │  node id -> bytes         │
//!   └──────────────────────────┘  └──────────────────────────┘
//! ```
//!
//! Metadata and content are not written transactionally. A failed store
//! write leaves the live map (and the content overlay) authoritative for
//! the rest of the session and is reported on `err:storage`.
//!
//! Capability checks are not done here; the app host gates every call.

pub mod dir_store;
pub mod error;
pub mod index;
pub mod memory;
pub mod storage;
pub mod store;
pub mod types;
pub mod vfs;

pub use dir_store::DirStore;
pub use error::{StorageErrorKind, VfsError};
pub use index::{SearchHit, SearchIndex, EXCERPT_CHARS};
pub use memory::MemoryStore;
pub use storage::StorageUsage;
pub use store::{ContentStore, MetadataStore};
pub use types::{
    guess_mime, validate_id, validate_name, ExternalHandle, FileEntry, Node, NodeId, NodeKind,
    ROOT_ID,
};
pub use vfs::Vfs;
