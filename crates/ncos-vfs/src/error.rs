//! Error types for the VFS layer.

use serde::{Deserialize, Serialize};

/// Specific kinds of storage errors.
///
/// Preserves the failure mode of the backing store instead of collapsing
/// everything into a string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StorageErrorKind {
    /// Backing store cannot be reached
    #[error("storage unavailable")]
    Unavailable,
    /// Key not found in storage
    #[error("key not found")]
    KeyNotFound,
    /// Stored data could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Underlying I/O failed
    #[error("i/o: {0}")]
    Io(String),
    /// Unknown error (fallback for string messages)
    #[error("{0}")]
    Unknown(String),
}

/// Errors from VFS operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VfsError {
    /// Node not found
    #[error("node not found: {0}")]
    NotFound(String),

    /// Parent is not a folder
    #[error("not a folder: {0}")]
    NotADirectory(String),

    /// Operation needs a file
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Operation needs a mount
    #[error("not a mount: {0}")]
    NotAMount(String),

    /// The root cannot be deleted, moved or renamed
    #[error("operation not permitted on root")]
    RootProtected,

    /// Invalid node name
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Node id unusable by a store
    #[error("invalid node id: {0}")]
    InvalidId(String),

    /// Reparenting would create a cycle
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// Storage backend error with detailed context
    #[error("storage error: {kind}{}", fmt_context(.context))]
    Storage {
        /// The specific error kind
        kind: StorageErrorKind,
        /// Optional additional context
        context: Option<String>,
    },
}

fn fmt_context(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

impl VfsError {
    /// Create a typed storage error.
    pub fn storage(kind: StorageErrorKind) -> Self {
        Self::Storage {
            kind,
            context: None,
        }
    }

    /// Create a typed storage error with context.
    pub fn storage_with_context(kind: StorageErrorKind, context: impl Into<String>) -> Self {
        Self::Storage {
            kind,
            context: Some(context.into()),
        }
    }

    /// Create an I/O storage error.
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::storage(StorageErrorKind::Io(err.to_string()))
    }

    /// Check if this is a "not found" error (including storage key not found).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VfsError::NotFound(_)
                | VfsError::Storage {
                    kind: StorageErrorKind::KeyNotFound,
                    ..
                }
        )
    }

    /// Check if the backing store failed (as opposed to a caller error).
    pub fn is_storage(&self) -> bool {
        matches!(self, VfsError::Storage { .. })
    }
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            VfsError::storage(StorageErrorKind::KeyNotFound)
        } else {
            VfsError::io(err)
        }
    }
}

impl From<serde_json::Error> for VfsError {
    fn from(err: serde_json::Error) -> Self {
        VfsError::storage(StorageErrorKind::Corrupt(err.to_string()))
    }
}
