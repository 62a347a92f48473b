//! Kernel error taxonomy.
//!
//! Lower-level errors from the desktop, VFS and bus crates convert into
//! one of these classes so hosted applications only ever see the kernel's
//! vocabulary.

use ncos_bus::BusError;
use ncos_desktop::DesktopError;
use ncos_perm::PermissionError;
use ncos_vfs::VfsError;

use crate::registry::RegistryError;

/// Errors surfaced by the kernel and the app host.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// A capability check failed (refused, cancelled or timed out)
    #[error("permission denied: {app} lacks {capability}")]
    PermissionDenied {
        /// App that asked
        app: String,
        /// Capability that was refused
        capability: String,
    },

    /// Operation on a missing node, window, space or app
    #[error("not found: {0}")]
    NotFound(String),

    /// A backing store refused a read or write
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Input rejected (import bounds, malformed bundle, bad names)
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// Import payload is larger than allowed
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    QuotaExceeded {
        /// Payload size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// App registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Event bus refused a subscription
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl KernelError {
    pub fn permission_denied(app: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::PermissionDenied {
            app: app.into(),
            capability: capability.into(),
        }
    }

    /// Check if this is a refused capability.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, KernelError::PermissionDenied { .. })
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KernelError::NotFound(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, KernelError::StorageFailure(_))
    }
}

impl From<VfsError> for KernelError {
    fn from(err: VfsError) -> Self {
        if err.is_storage() && !err.is_not_found() {
            KernelError::StorageFailure(err.to_string())
        } else if err.is_not_found() {
            KernelError::NotFound(err.to_string())
        } else {
            KernelError::ValidationFailure(err.to_string())
        }
    }
}

impl From<DesktopError> for KernelError {
    fn from(err: DesktopError) -> Self {
        if err.is_not_found() {
            KernelError::NotFound(err.to_string())
        } else {
            KernelError::ValidationFailure(err.to_string())
        }
    }
}

impl From<PermissionError> for KernelError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::UnknownCorrelation(id) => {
                KernelError::NotFound(format!("permission request {}", id))
            }
            PermissionError::Cancelled => {
                KernelError::ValidationFailure(PermissionError::Cancelled.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::ValidationFailure(format!("malformed json: {}", err))
    }
}

impl From<std::io::Error> for KernelError {
    fn from(err: std::io::Error) -> Self {
        KernelError::StorageFailure(err.to_string())
    }
}
