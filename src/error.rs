//! Error types for sequence and stream operations
//!
//! Errors are `Clone` so a single failure can be forwarded to every upstream
//! source a combinator owns while still being returned to the caller.

use thiserror::Error;

/// Main error type for seqflow operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeqError {
    /// A mapper, predicate or reducer failed
    #[error("callback failed: {0}")]
    Callback(String),
    /// An upstream source failed while producing a value
    #[error("upstream failed: {0}")]
    Upstream(String),
    /// The stream was cancelled by its reader
    #[error("stream cancelled")]
    Cancelled,
    /// The stream already has an active reader
    #[error("stream is locked to another reader")]
    Locked,
    /// The stream was closed before the operation could complete
    #[error("stream closed")]
    Closed,
    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl SeqError {
    pub fn callback(msg: impl Into<String>) -> Self {
        SeqError::Callback(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        SeqError::Upstream(msg.into())
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        SeqError::Custom(msg.into())
    }
}

impl From<std::io::Error> for SeqError {
    fn from(err: std::io::Error) -> Self {
        SeqError::Upstream(err.to_string())
    }
}

/// Result type for seqflow operations
pub type SeqResult<T> = Result<T, SeqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(SeqError::callback("boom").to_string(), "callback failed: boom");
        assert_eq!(SeqError::Locked.to_string(), "stream is locked to another reader");
        assert_eq!(SeqError::custom("x").to_string(), "x");
    }

    #[test]
    fn io_errors_become_upstream() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(SeqError::from(io), SeqError::Upstream("disk".into()));
    }
}
