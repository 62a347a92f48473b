//! Error types for the event bus.

/// Errors from bus operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Subscribing would exceed the configured subscriber bound
    #[error("subscriber limit reached ({limit})")]
    SubscriberLimit {
        /// Configured maximum
        limit: usize,
    },

    /// Channel name is empty or malformed
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),
}
