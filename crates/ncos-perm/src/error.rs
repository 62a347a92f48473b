//! Error types for the permission broker.

/// Errors from permission operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// No outstanding request carries this correlation id
    #[error("unknown correlation id: {0}")]
    UnknownCorrelation(String),

    /// The request was cancelled before a decision arrived
    #[error("permission request cancelled")]
    Cancelled,
}
