//! The hardware codec stage.
//!
//! Wraps one [`CodecHandle`] behind the common stage contract. The adapter
//! owns three disciplines the backend does not provide on its own:
//!
//! - **Exhaust-then-feed**: every `process()` call drains one unit of
//!   already-available output before feeding input. Backend output queues
//!   are bounded; draining first keeps the session from stalling.
//! - **Partial input consumption**: when a slot is smaller than the
//!   remaining input, only the slot's worth is copied and the input buffer
//!   is advanced in place for the caller to re-invoke.
//! - **Reconfigure without leaks**: a format change only reallocates the
//!   backend handle when the live one no longer matches, and teardown
//!   releases the handle even when stopping it fails.

use crate::error::{HwError, Result};
use crate::service::{CodecHandle, CodecService, OutputUnit, SessionRequest};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};
use vidbridge_core::buffer::{Buffer, SurfaceToken};
use vidbridge_core::format::{FormatDescriptor, VideoEncoding};
use vidbridge_core::pool::SharedBufferPool;
use vidbridge_core::stage::{ProcessStatus, SessionState, Stage};

struct HwInner {
    state: SessionState,
    handle: Option<Box<dyn CodecHandle>>,
    input_format: Option<FormatDescriptor>,
    output_format: Option<FormatDescriptor>,
    /// Request the live handle was opened for.
    bound: Option<SessionRequest>,
    surface: Option<SurfaceToken>,
    frame_rate: Option<f64>,
    bitrate: Option<u32>,
}

/// Hardware codec stage: one service-backed session behind the stage
/// contract.
///
/// All session state sits behind one per-instance mutex so that `open`,
/// `close` and format changes arriving from another thread exclude an
/// in-flight `process()` on the same instance. Separate instances share
/// nothing.
pub struct HwVideoStage {
    name: String,
    service: Arc<dyn CodecService>,
    pool: SharedBufferPool,
    inner: Mutex<HwInner>,
}

impl HwVideoStage {
    /// Create a stage over `service`. The stage stays idle until both
    /// formats are set and `open()` is called.
    pub fn new(name: impl Into<String>, service: Arc<dyn CodecService>) -> Self {
        Self {
            name: name.into(),
            service,
            pool: SharedBufferPool::new(),
            inner: Mutex::new(HwInner {
                state: SessionState::Closed,
                handle: None,
                input_format: None,
                output_format: None,
                bound: None,
                surface: None,
                frame_rate: None,
                bitrate: None,
            }),
        }
    }

    /// Bind a display surface for the zero-copy decode path.
    ///
    /// The surface is externally owned; the stage must be closed before the
    /// renderer invalidates it.
    pub fn with_surface(self, token: SurfaceToken) -> Self {
        self.inner.lock().surface = Some(token);
        self
    }

    /// Set the encoder target bitrate, in bits per second.
    pub fn with_bitrate(self, bitrate: u32) -> Self {
        self.inner.lock().bitrate = Some(bitrate);
        self
    }

    /// Set the nominal frame rate.
    pub fn with_frame_rate(self, fps: f64) -> Self {
        self.inner.lock().frame_rate = Some(fps);
        self
    }

    /// The pool backing this stage's output payloads.
    pub fn pool(&self) -> &SharedBufferPool {
        &self.pool
    }

    /// Derive the session request from the negotiated formats.
    fn build_request(inner: &HwInner) -> Result<SessionRequest> {
        let (input, output) = match (&inner.input_format, &inner.output_format) {
            (Some(i), Some(o)) => (i, o),
            _ => return Err(HwError::InvalidFormats("formats not negotiated".into())),
        };

        // The compressed side names the codec; the raw side supplies the
        // layout and, for the surface path, may be absent entirely.
        let (compressed, raw, encoder) = if output.encoding.is_compressed() {
            (output, input, true)
        } else if input.encoding.is_compressed() {
            (input, output, false)
        } else {
            return Err(HwError::InvalidFormats(format!(
                "neither {} nor {} is a compressed encoding",
                input, output
            )));
        };

        let (width, height) = compressed
            .dimensions()
            .or_else(|| raw.dimensions())
            .ok_or_else(|| HwError::InvalidFormats("no dimensions negotiated".into()))?;

        let surface = if raw.encoding == VideoEncoding::OpaqueSurface {
            match inner.surface {
                Some(token) => Some(token),
                None => return Err(HwError::NoSurface),
            }
        } else {
            None
        };

        Ok(SessionRequest {
            encoding: compressed.encoding,
            layout: raw.layout,
            width,
            height,
            frame_rate: inner.frame_rate.or(compressed.frame_rate).or(raw.frame_rate),
            bitrate: if encoder { inner.bitrate } else { None },
            encoder,
            surface,
        })
    }

    /// Stop and release the live handle. Release always runs.
    fn close_handle(name: &str, inner: &mut HwInner) {
        if let Some(mut handle) = inner.handle.take() {
            if let Err(err) = handle.stop() {
                warn!(stage = name, error = %err, "backend stop failed during teardown");
            }
            handle.release();
            info!(stage = name, "codec handle released");
        }
        inner.bound = None;
        inner.state = SessionState::Closed;
    }

    fn open_locked(&self, inner: &mut HwInner) -> Result<()> {
        // Idle until the surrounding pipeline completes negotiation.
        if inner.input_format.is_none() || inner.output_format.is_none() {
            return Ok(());
        }

        let request = Self::build_request(inner)?;

        // A live handle that already matches the requested type and layout
        // is kept as-is; size or orientation changes fall through to a full
        // close-then-reopen.
        if inner.state == SessionState::Ready && inner.bound.as_ref() == Some(&request) {
            return Ok(());
        }

        Self::close_handle(&self.name, inner);

        inner.state = SessionState::Opening;
        match self.service.open_codec(&request) {
            Ok(handle) => {
                info!(
                    stage = %self.name,
                    codec = %request.encoding,
                    width = request.width,
                    height = request.height,
                    encoder = request.encoder,
                    "codec session opened"
                );
                inner.handle = Some(handle);
                inner.bound = Some(request);
                inner.state = SessionState::Ready;
                Ok(())
            }
            Err(err) => {
                inner.state = SessionState::Closed;
                Err(err)
            }
        }
    }
}

impl Stage for HwVideoStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_input_format(&mut self, format: FormatDescriptor) -> vidbridge_core::Result<()> {
        let mut inner = self.inner.lock();
        inner.input_format = Some(format);
        if inner.state == SessionState::Ready {
            self.open_locked(&mut inner).map_err(vidbridge_core::Error::stage)?;
        }
        Ok(())
    }

    fn set_output_format(&mut self, format: FormatDescriptor) -> vidbridge_core::Result<()> {
        let mut inner = self.inner.lock();
        inner.output_format = Some(format);
        if inner.state == SessionState::Ready {
            self.open_locked(&mut inner).map_err(vidbridge_core::Error::stage)?;
        }
        Ok(())
    }

    fn input_format(&self) -> Option<FormatDescriptor> {
        self.inner.lock().input_format.clone()
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.inner.lock().output_format.clone()
    }

    fn open(&mut self) -> vidbridge_core::Result<()> {
        let mut inner = self.inner.lock();
        self.open_locked(&mut inner).map_err(vidbridge_core::Error::stage)
    }

    fn process(
        &mut self,
        input: &mut Buffer,
        output: &mut Buffer,
    ) -> vidbridge_core::Result<ProcessStatus> {
        self.process_hw(input, output).map_err(vidbridge_core::Error::stage)
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        Self::close_handle(&self.name, &mut inner);
        self.pool.drain();
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }
}

impl HwVideoStage {
    /// Typed processing entry point; the `Stage` impl adapts the error.
    pub fn process_hw(&self, input: &mut Buffer, output: &mut Buffer) -> Result<ProcessStatus> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Ready {
            return Err(HwError::SessionClosed);
        }

        // Exhaust: hand back one pending output unit before touching input.
        let drained = inner
            .handle
            .as_mut()
            .ok_or(HwError::SessionClosed)?
            .dequeue_output()?;
        match drained {
            Some(OutputUnit::Bytes {
                data,
                pts,
                keyframe,
            }) => {
                output.ensure_capacity(data.len(), &self.pool);
                output.fill_from(&data)?;
                output.pts = pts;
                output.set_keyframe(keyframe);
                output.format = inner.output_format.clone();
                return Ok(ProcessStatus::INPUT_NOT_CONSUMED);
            }
            Some(OutputUnit::Rendered { pts }) => {
                let token = inner.surface.ok_or(HwError::NoSurface)?;
                output.fill_surface(token, &self.pool);
                output.pts = pts;
                output.format = inner.output_format.clone();
                return Ok(ProcessStatus::INPUT_NOT_CONSUMED);
            }
            None => {}
        }

        // Feed: push as much input as one slot accepts.
        let slot = inner
            .handle
            .as_mut()
            .ok_or(HwError::SessionClosed)?
            .dequeue_input()?;
        let Some(slot) = slot else {
            // No slot available: try again later, without blocking.
            return Ok(ProcessStatus::INPUT_NOT_CONSUMED | ProcessStatus::OUTPUT_NOT_FILLED);
        };

        let take = slot.capacity.min(input.remaining());
        let pts = input.pts;
        {
            let chunk = &input.data()?[..take];
            inner
                .handle
                .as_mut()
                .ok_or(HwError::SessionClosed)?
                .queue_input(slot, chunk, pts)?;
        }
        input.advance(take);

        if input.remaining() == 0 {
            Ok(ProcessStatus::OUTPUT_NOT_FILLED)
        } else {
            Ok(ProcessStatus::INPUT_NOT_CONSUMED | ProcessStatus::OUTPUT_NOT_FILLED)
        }
    }
}

impl Drop for HwVideoStage {
    fn drop(&mut self) {
        self.close();
    }
}
