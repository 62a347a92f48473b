//! System snapshot persistence.

mod import;
mod snapshot;
mod store;

pub use import::{check_shape, validate_bundle};
pub use snapshot::SystemSnapshot;
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
