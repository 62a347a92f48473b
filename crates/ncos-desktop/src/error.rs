//! Error types for the window and space manager.

use serde::{Deserialize, Serialize};

use crate::space::SpaceId;

/// Errors returned by desktop commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DesktopError {
    /// No window with this id
    #[error("window not found: {0}")]
    WindowNotFound(String),

    /// No space with this id
    #[error("space not found: {0}")]
    SpaceNotFound(SpaceId),

    /// Window ids must be non-empty
    #[error("invalid window id: {0:?}")]
    InvalidWindowId(String),

    /// Space labels must be non-empty
    #[error("invalid space label: {0:?}")]
    InvalidLabel(String),

    /// Snapshot could not be turned into a consistent state
    #[error("invalid desktop snapshot: {0}")]
    InvalidSnapshot(String),
}

impl DesktopError {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DesktopError::WindowNotFound(_) | DesktopError::SpaceNotFound(_)
        )
    }
}
