//! Pipeline error types.

use thiserror::Error;
use vidbridge_core::format::FormatDescriptor;

/// Pipeline error type.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No backend can satisfy the input format. Non-fatal for the
    /// surrounding session: the call proceeds without this layer.
    #[error("No backend can satisfy input format {0}")]
    Negotiation(FormatDescriptor),

    /// Invalid build configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] vidbridge_core::Error),

    /// Hardware adapter error.
    #[error("Hardware adapter error: {0}")]
    Hw(#[from] vidbridge_hw::HwError),

    /// Software compressor error.
    #[error("Software compressor error: {0}")]
    Vpx(#[from] vidbridge_vpx::VpxError),
}

impl PipelineError {
    /// Check whether this is a negotiation failure, the one error the
    /// caller is expected to absorb by running without a video pipeline.
    pub fn is_negotiation(&self) -> bool {
        matches!(self, PipelineError::Negotiation(_))
    }
}

/// Pipeline result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
