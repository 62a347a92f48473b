//! Night City Event Bus
//!
//! The bus is the kernel's leaf subsystem. Every other crate publishes
//! through it and it is the single sink for audit records:
//!
//! - **Event**: typed `KernelEvent` payloads and well-known channel names
//! - **Bus**: channel-keyed publish/subscribe with a bounded subscriber count
//! - **Audit**: capped, most-recent-first ring buffer of security events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  publish   ┌──────────────────────────────┐
//! │  perm / vfs  │──────────▶│           EventBus            │
//! │  desktop     │            │  channels ─▶ handlers         │
//! └──────────────┘            │  history (bounded)            │
//!        │  record_audit      │  AuditLog (ring, newest first)│
//!        └──────────────────▶│  sys:* / err:* ─▶ log facade   │
//!                             └──────────────────────────────┘
//! ```
//!
//! Everything runs on one cooperative thread, so the bus is a cheap
//! `Rc` handle rather than a synchronised object.

pub mod audit;
pub mod bus;
pub mod clock;
pub mod error;
pub mod event;

pub use audit::{AuditEntry, AuditLog, AuditOutcome, DEFAULT_AUDIT_CAPACITY};
pub use bus::{BusLimits, EventBus, PublishHold, Subscription};
pub use clock::now_millis;
pub use error::BusError;
pub use event::{channels, ErrorReport, Event, FsChange, KernelEvent};
