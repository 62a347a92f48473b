//! Persistence module for state serialization
//!
//! Provides snapshot export/import for desktop state.

mod snapshot;

pub use snapshot::DesktopSnapshot;
