use std::time::Duration;

/// Domain-level errors raised while building core values.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Missing or malformed process configuration. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Failure reported by one of the pipeline's downstream collaborators.
///
/// Sink implementations convert their transport-specific errors into this
/// type so the pipeline can log them uniformly.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Forwarding failed: {0}")]
    Forwarding(String),

    #[error("Sink call timed out after {0:?}")]
    Timeout(Duration),
}
