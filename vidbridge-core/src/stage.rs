//! The stage contract shared by every backend.
//!
//! A stage is one open/process/close unit in the processing graph. The
//! upstream driver thread calls [`Stage::process`] sequentially; `open`,
//! `close` and format changes may arrive from a different thread (an
//! orientation change, a call teardown) and implementations guard their
//! session state with a per-instance lock.

use crate::buffer::Buffer;
use crate::error::Result;
use crate::format::FormatDescriptor;
use bitflags::bitflags;

bitflags! {
    /// Outcome of one `process()` call.
    ///
    /// The empty set means "processed": input consumed and, when the stage
    /// produces data, output filled. Input and output outcomes are
    /// independent, so they combine as flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProcessStatus: u32 {
        /// The input buffer still holds unconsumed data; the caller must
        /// re-invoke `process()` with the same buffer.
        const INPUT_NOT_CONSUMED = 0x0001;
        /// No output was produced by this call.
        const OUTPUT_NOT_FILLED = 0x0002;
    }
}

impl ProcessStatus {
    /// Input consumed and output (if any) delivered.
    pub const PROCESSED: ProcessStatus = ProcessStatus::empty();

    /// Check whether the input was fully consumed.
    pub fn input_consumed(&self) -> bool {
        !self.contains(ProcessStatus::INPUT_NOT_CONSUMED)
    }

    /// Check whether output was produced.
    pub fn output_filled(&self) -> bool {
        !self.contains(ProcessStatus::OUTPUT_NOT_FILLED)
    }
}

/// Lifecycle state of a codec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No backend handle is held.
    #[default]
    Closed,
    /// A backend handle is being allocated.
    Opening,
    /// A backend handle is allocated and started.
    Ready,
}

/// A processing stage: one codec session behind the buffer contract.
///
/// Invariants:
/// - `Ready` implies a live backend handle; `Closed` implies none.
/// - `open()` is a no-op until both formats are set.
/// - `close()` is idempotent and releases resources on every path.
/// - Transient per-frame failures mark the outgoing buffer `DISCARD` and
///   return `Ok`; only fatal backend faults return `Err`.
pub trait Stage: Send {
    /// Get the stage name, for logs.
    fn name(&self) -> &str;

    /// Set the input format. May trigger a reconfigure when open.
    fn set_input_format(&mut self, format: FormatDescriptor) -> Result<()>;

    /// Set the output format. May trigger a reconfigure when open.
    fn set_output_format(&mut self, format: FormatDescriptor) -> Result<()>;

    /// Get the input format, when set.
    fn input_format(&self) -> Option<FormatDescriptor>;

    /// Get the output format, when set.
    fn output_format(&self) -> Option<FormatDescriptor>;

    /// Allocate and start the backend session.
    fn open(&mut self) -> Result<()>;

    /// Process one step: drain pending output or consume (part of) `input`.
    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<ProcessStatus>;

    /// Stop and release the backend session.
    fn close(&mut self);

    /// Get the session state.
    fn state(&self) -> SessionState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_is_empty() {
        let status = ProcessStatus::PROCESSED;
        assert!(status.input_consumed());
        assert!(status.output_filled());
    }

    #[test]
    fn test_combined_flags() {
        let status = ProcessStatus::INPUT_NOT_CONSUMED | ProcessStatus::OUTPUT_NOT_FILLED;
        assert!(!status.input_consumed());
        assert!(!status.output_filled());
    }

    #[test]
    fn test_output_without_consuming_input() {
        // The exhaust-then-feed path: output drained, input untouched.
        let status = ProcessStatus::INPUT_NOT_CONSUMED;
        assert!(!status.input_consumed());
        assert!(status.output_filled());
    }
}
