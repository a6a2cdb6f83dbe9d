//! The software compressor stage.
//!
//! Drives a [`VpxLibrary`] encoder behind the common stage contract. One
//! encode call may emit more than one compressed packet, so processing is
//! two-phase: an encode call arms the packet iterator, then each
//! `process()` call drains exactly one packet until the iterator runs dry.
//! While packets remain unread the stage skips encoding entirely and
//! reports the input as not consumed, so the driver re-invokes without
//! resubmitting new data.

use crate::error::{Result, VpxError};
use crate::library::{EncodeFlags, EncoderConfig, ImageBuffer, VpxContext, VpxLibrary};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};
use vidbridge_core::buffer::Buffer;
use vidbridge_core::format::{FormatDescriptor, PixelLayout, VideoEncoding};
use vidbridge_core::pool::SharedBufferPool;
use vidbridge_core::stage::{ProcessStatus, SessionState, Stage};
use vidbridge_negotiate::{CapabilityCatalog, CapabilityEntry};

/// Log at most one encode failure in every run of this many.
const FAILURE_LOG_INTERVAL: u64 = 50;

/// The capability catalog of the software path: what the compressor can
/// accept and emit, in the same shape the hardware service reports, so the
/// pipeline negotiates both backends through one code path.
pub fn software_capabilities() -> CapabilityCatalog {
    CapabilityCatalog::from_entries(vec![
        CapabilityEntry::encoder(VideoEncoding::Vp8, vec![PixelLayout::I420]),
        CapabilityEntry::encoder(VideoEncoding::Vp9, vec![PixelLayout::I420]),
    ])
}

struct VpxInner {
    state: SessionState,
    context: Option<Box<dyn VpxContext>>,
    image: Option<ImageBuffer>,
    input_format: Option<FormatDescriptor>,
    output_format: Option<FormatDescriptor>,
    /// Config the live context was allocated with.
    bound: Option<EncoderConfig>,
    /// Encode the next frame as a keyframe (armed by a resize).
    force_keyframe: bool,
    /// Packets from the last encode call remain unread.
    leftover_packets: bool,
    target_bitrate: u32,
    frames_encoded: u64,
    encode_failures: u64,
}

/// Software compressor stage.
///
/// Session state sits behind one per-instance mutex, mirroring the
/// hardware adapter: `open`/`close`/format changes from another thread
/// exclude an in-flight `process()` on the same instance.
pub struct VpxCompressor {
    name: String,
    library: Arc<dyn VpxLibrary>,
    pool: SharedBufferPool,
    inner: Mutex<VpxInner>,
}

impl VpxCompressor {
    /// Create a compressor over `library`.
    pub fn new(name: impl Into<String>, library: Arc<dyn VpxLibrary>) -> Self {
        Self {
            name: name.into(),
            library,
            pool: SharedBufferPool::new(),
            inner: Mutex::new(VpxInner {
                state: SessionState::Closed,
                context: None,
                image: None,
                input_format: None,
                output_format: None,
                bound: None,
                force_keyframe: false,
                leftover_packets: false,
                target_bitrate: EncoderConfig::default().target_bitrate,
                frames_encoded: 0,
                encode_failures: 0,
            }),
        }
    }

    /// Set the target bitrate in kilobits per second. Applied when the
    /// context is (re)allocated, never to a live context.
    pub fn with_bitrate(self, kbps: u32) -> Self {
        self.inner.lock().target_bitrate = kbps;
        self
    }

    /// The pool backing this stage's output payloads.
    pub fn pool(&self) -> &SharedBufferPool {
        &self.pool
    }

    /// Number of frames fed to the native encode call so far.
    pub fn frames_encoded(&self) -> u64 {
        self.inner.lock().frames_encoded
    }

    /// Number of failed encode calls so far.
    pub fn encode_failures(&self) -> u64 {
        self.inner.lock().encode_failures
    }

    fn build_config(inner: &VpxInner) -> Result<EncoderConfig> {
        let input = inner
            .input_format
            .as_ref()
            .ok_or_else(|| VpxError::InvalidFormats("input format not set".into()))?;
        let output = inner
            .output_format
            .as_ref()
            .ok_or_else(|| VpxError::InvalidFormats("output format not set".into()))?;

        if input.encoding != VideoEncoding::RawYuv {
            return Err(VpxError::InvalidFormats(format!(
                "compressor input must be raw video, got {}",
                input
            )));
        }
        if !output.encoding.is_compressed() {
            return Err(VpxError::InvalidFormats(format!(
                "compressor output must be compressed, got {}",
                output
            )));
        }
        let (width, height) = input
            .dimensions()
            .ok_or_else(|| VpxError::InvalidFormats("input dimensions not set".into()))?;

        Ok(EncoderConfig {
            codec: output.encoding,
            width,
            height,
            target_bitrate: inner.target_bitrate,
            ..Default::default()
        })
    }

    /// Free the context and image buffer. The two lifetimes are
    /// independent; both always end here.
    fn release_locked(name: &str, inner: &mut VpxInner) {
        let had_session = inner.context.take().is_some() | inner.image.take().is_some();
        if had_session {
            info!(stage = name, "compressor context and image released");
        }
        inner.bound = None;
        inner.leftover_packets = false;
        inner.force_keyframe = false;
        inner.state = SessionState::Closed;
    }

    fn open_locked(&self, inner: &mut VpxInner) -> Result<()> {
        // Idle until the surrounding pipeline completes negotiation.
        if inner.input_format.is_none() || inner.output_format.is_none() {
            return Ok(());
        }

        let config = Self::build_config(inner)?;
        if inner.state == SessionState::Ready && inner.bound.as_ref() == Some(&config) {
            return Ok(());
        }

        Self::release_locked(&self.name, inner);

        inner.state = SessionState::Opening;
        let layout = inner
            .input_format
            .as_ref()
            .and_then(|f| f.layout)
            .unwrap_or(PixelLayout::I420);
        let image = match self.library.alloc_image(layout, config.width, config.height) {
            Ok(image) => image,
            Err(err) => {
                inner.state = SessionState::Closed;
                return Err(err);
            }
        };
        let context = match self.library.new_context(&config) {
            Ok(context) => context,
            Err(err) => {
                inner.state = SessionState::Closed;
                return Err(err);
            }
        };

        info!(
            stage = %self.name,
            codec = %config.codec,
            width = config.width,
            height = config.height,
            bitrate_kbps = config.target_bitrate,
            "compressor session opened"
        );
        inner.image = Some(image);
        inner.context = Some(context);
        inner.bound = Some(config);
        inner.state = SessionState::Ready;
        Ok(())
    }

    /// Drain one packet from the iterator into `output`.
    ///
    /// Returns the status for this call: input still unconsumed while a
    /// packet was delivered, or consumed once the iterator is dry.
    fn drain_one(&self, inner: &mut VpxInner, input: &mut Buffer, output: &mut Buffer) -> Result<ProcessStatus> {
        let context = inner.context.as_mut().ok_or(VpxError::SessionClosed)?;
        match context.next_packet() {
            Some(packet) => {
                output.ensure_capacity(packet.data.len(), &self.pool);
                output.fill_from(&packet.data)?;
                output.pts = packet.pts;
                output.set_keyframe(packet.keyframe);
                output.format = inner.output_format.clone();
                Ok(ProcessStatus::INPUT_NOT_CONSUMED)
            }
            None => {
                inner.leftover_packets = false;
                input.advance(input.remaining());
                Ok(ProcessStatus::OUTPUT_NOT_FILLED)
            }
        }
    }

    /// Typed processing entry point; the `Stage` impl adapts the error.
    pub fn process_vpx(&self, input: &mut Buffer, output: &mut Buffer) -> Result<ProcessStatus> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Ready {
            return Err(VpxError::SessionClosed);
        }

        // Phase two: packets from a previous encode are still unread. Skip
        // encoding entirely and only drain.
        if inner.leftover_packets {
            return self.drain_one(&mut inner, input, output);
        }

        // Phase one: feed exactly one raw frame.
        let (frame_width, frame_height) = input
            .format
            .as_ref()
            .and_then(|f| f.dimensions())
            .or_else(|| inner.input_format.as_ref().and_then(|f| f.dimensions()))
            .ok_or_else(|| VpxError::InvalidFormats("frame dimensions unknown".into()))?;

        // A size change swaps the image buffer and forces one keyframe.
        // The encoder context is left alone.
        let image = inner.image.as_ref().ok_or(VpxError::SessionClosed)?;
        if image.dimensions() != (frame_width, frame_height) {
            let layout = image.layout();
            info!(
                stage = %self.name,
                width = frame_width,
                height = frame_height,
                "frame size changed, reallocating image buffer"
            );
            inner.image = Some(self.library.alloc_image(layout, frame_width, frame_height)?);
            inner.force_keyframe = true;
        }

        let flags = if inner.force_keyframe {
            EncodeFlags::FORCE_KEYFRAME
        } else {
            EncodeFlags::empty()
        };
        // The flag covers exactly the next encode call.
        inner.force_keyframe = false;

        let pts = input.pts;
        let encoded = Self::encode_frame(&mut inner, input, pts, flags);
        match encoded {
            Ok(()) => {
                inner.frames_encoded += 1;
                inner.leftover_packets = true;
                self.drain_one(&mut inner, input, output)
            }
            Err(err) => {
                // Transient: drop the frame, keep the stream going.
                if inner.encode_failures % FAILURE_LOG_INTERVAL == 0 {
                    warn!(
                        stage = %self.name,
                        error = %err,
                        failures = inner.encode_failures + 1,
                        "encode failed, discarding frame"
                    );
                }
                inner.encode_failures += 1;
                output.mark_discard();
                input.advance(input.remaining());
                Ok(ProcessStatus::OUTPUT_NOT_FILLED)
            }
        }
    }

    fn encode_frame(
        inner: &mut VpxInner,
        input: &Buffer,
        pts: i64,
        flags: EncodeFlags,
    ) -> Result<()> {
        let data = input.data()?;
        let image = inner.image.as_mut().ok_or(VpxError::SessionClosed)?;
        image.import(data)?;
        let context = inner.context.as_mut().ok_or(VpxError::SessionClosed)?;
        context.encode(image, pts, flags)
    }
}

impl Stage for VpxCompressor {
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
        self.process_vpx(input, output).map_err(vidbridge_core::Error::stage)
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        Self::release_locked(&self.name, &mut inner);
        self.pool.drain();
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }
}

impl Drop for VpxCompressor {
    fn drop(&mut self) {
        self.close();
    }
}
