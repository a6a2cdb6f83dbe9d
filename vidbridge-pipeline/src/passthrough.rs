//! The surface passthrough stage.
//!
//! When the hardware adapter renders straight into a display surface there
//! is no data to move, but the processing graph still needs a stage where
//! the decoded-frame hop would be. This stage accepts the opaque-surface
//! format on both sides, never touches payload bytes, and owns nothing.

use vidbridge_core::buffer::Buffer;
use vidbridge_core::format::{FormatDescriptor, VideoEncoding};
use vidbridge_core::stage::{ProcessStatus, SessionState, Stage};
use vidbridge_core::{Error, Result};

/// A data-less placeholder stage for the zero-copy render path.
pub struct SurfacePassthrough {
    name: String,
    input_format: Option<FormatDescriptor>,
    output_format: Option<FormatDescriptor>,
    opened: bool,
}

impl SurfacePassthrough {
    /// Create a passthrough stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_format: None,
            output_format: None,
            opened: false,
        }
    }

    fn accept(format: FormatDescriptor) -> Result<FormatDescriptor> {
        if format.encoding != VideoEncoding::OpaqueSurface {
            return Err(Error::invalid_format(format!(
                "passthrough accepts only the opaque-surface format, got {}",
                format
            )));
        }
        Ok(format)
    }
}

impl Stage for SurfacePassthrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_input_format(&mut self, format: FormatDescriptor) -> Result<()> {
        self.input_format = Some(Self::accept(format)?);
        Ok(())
    }

    fn set_output_format(&mut self, format: FormatDescriptor) -> Result<()> {
        self.output_format = Some(Self::accept(format)?);
        Ok(())
    }

    fn input_format(&self) -> Option<FormatDescriptor> {
        self.input_format.clone()
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output_format.clone()
    }

    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn process(&mut self, input: &mut Buffer, _output: &mut Buffer) -> Result<ProcessStatus> {
        // Rendering already happened inside the upstream adapter; there is
        // nothing to move and nothing to produce.
        input.advance(input.remaining());
        Ok(ProcessStatus::OUTPUT_NOT_FILLED)
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn state(&self) -> SessionState {
        if self.opened {
            SessionState::Ready
        } else {
            SessionState::Closed
        }
    }
}
