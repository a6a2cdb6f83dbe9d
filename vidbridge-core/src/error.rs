//! Error types shared across the vidbridge stages.

use thiserror::Error;

/// Core error type for the vidbridge layer.
#[derive(Error, Debug)]
pub enum Error {
    /// A format was missing or malformed for the attempted operation.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The stage was used in a state that does not permit the operation.
    #[error("Stage is {0:?}, operation requires an open session")]
    SessionClosed(crate::stage::SessionState),

    /// A payload of the wrong kind was handed to a stage.
    #[error("Unexpected buffer payload: expected {expected}, found {found}")]
    PayloadMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Buffer too small for the operation.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// A backend stage failed fatally; the caller is expected to close and
    /// rebuild the stage.
    #[error("Stage failure: {0}")]
    Stage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Wrap a backend error as a fatal stage failure.
    pub fn stage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Stage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_param("bitrate must be non-zero");
        assert_eq!(err.to_string(), "Invalid parameter: bitrate must be non-zero");
    }

    #[test]
    fn test_buffer_too_small_display() {
        let err = Error::BufferTooSmall {
            needed: 128,
            available: 64,
        };
        assert_eq!(err.to_string(), "Buffer too small: need 128 bytes, have 64");
    }
}
