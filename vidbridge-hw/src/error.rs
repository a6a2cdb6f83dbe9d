//! Error types for the hardware codec adapter.

use thiserror::Error;

/// Hardware adapter error.
#[derive(Error, Debug)]
pub enum HwError {
    /// No backend handle matching the negotiated formats could be
    /// allocated or started.
    #[error("Codec resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The backend returned a status code this layer does not understand.
    #[error("Unexpected backend status {code} during {operation}")]
    Backend { operation: &'static str, code: i32 },

    /// The session is not open.
    #[error("Codec session is not open")]
    SessionClosed,

    /// The negotiated formats do not describe a codec session.
    #[error("Invalid session formats: {0}")]
    InvalidFormats(String),

    /// A rendered frame was reported but no surface is bound.
    #[error("Backend rendered a frame without a bound surface")]
    NoSurface,

    /// Core buffer error.
    #[error("Buffer error: {0}")]
    Core(#[from] vidbridge_core::Error),
}

/// Result type for hardware adapter operations.
pub type Result<T> = std::result::Result<T, HwError>;
