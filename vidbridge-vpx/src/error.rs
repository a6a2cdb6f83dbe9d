//! Error types for the software compressor.

use thiserror::Error;

/// Software compressor error.
#[derive(Error, Debug)]
pub enum VpxError {
    /// The encoder context could not be allocated or configured.
    #[error("Failed to allocate encoder context: {0}")]
    ContextAlloc(String),

    /// The image buffer could not be allocated.
    #[error("Failed to allocate image buffer: {0}")]
    ImageAlloc(String),

    /// A frame did not match the image buffer geometry.
    #[error("Frame data too short: need {needed} bytes, have {available}")]
    ShortFrame { needed: usize, available: usize },

    /// The pixel layout is not supported by the library.
    #[error("Unsupported pixel layout: {0}")]
    UnsupportedLayout(String),

    /// An encode call failed inside the native library.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// The session is not open.
    #[error("Compressor session is not open")]
    SessionClosed,

    /// The negotiated formats do not describe an encode session.
    #[error("Invalid session formats: {0}")]
    InvalidFormats(String),

    /// Core buffer error.
    #[error("Buffer error: {0}")]
    Core(#[from] vidbridge_core::Error),
}

/// Result type for software compressor operations.
pub type Result<T> = std::result::Result<T, VpxError>;
