//! Error types for the event dispatcher

/// Errors raised by registration, resolution and dispatch.
///
/// Every variant aborts the call that produced it. Listeners that already ran
/// during a failed `fire` are not rolled back.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed declaration, parameter key or fire target, or a listener
    /// handle/method that does not resolve
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by a listener body, propagated to the `fire` caller as is
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),

    /// Serialization failed while keying or reporting listener data
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    /// Shorthand for building an [`DispatchError::InvalidArgument`]
    pub fn invalid(message: impl Into<String>) -> Self {
        DispatchError::InvalidArgument(message.into())
    }

    /// Returns true for the invalid-argument kind
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, DispatchError::InvalidArgument(_))
    }
}

/// Result type used throughout the dispatcher
pub type Result<T> = std::result::Result<T, DispatchError>;
