//! The native compression library, specified at its interface.
//!
//! The surface mirrors what a realtime VPX-style encoder exposes: image
//! buffers and encoder contexts with independent lifetimes, a one-frame
//! encode call, and a get-next-packet iterator that outlives a single
//! encode because one frame may legitimately split across several packets.

use crate::error::{Result, VpxError};
use bitflags::bitflags;
use vidbridge_core::format::{PixelLayout, VideoEncoding};

/// Rate control mode for the encoder context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateControlMode {
    /// Constant bitrate; the mode used for live calls.
    #[default]
    Cbr,
    /// Variable bitrate.
    Vbr,
    /// Constant quality.
    ConstantQuality,
}

/// Keyframe placement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyframeMode {
    /// The library decides when to emit keyframes.
    #[default]
    Auto,
    /// Keyframes only when forced per encode call.
    Disabled,
}

bitflags! {
    /// Per-encode-call flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EncodeFlags: u32 {
        /// Encode this frame as a keyframe regardless of placement mode.
        const FORCE_KEYFRAME = 0x0001;
    }
}

/// Encoder context configuration.
///
/// Everything here is applied once when the context is allocated and never
/// touched again for the life of the session; a frame-size change
/// reallocates only the image buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// Target codec.
    pub codec: VideoEncoding,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Target bitrate in kilobits per second.
    pub target_bitrate: u32,
    /// Rate control mode.
    pub rate_control: RateControlMode,
    /// Keyframe placement mode.
    pub keyframe_mode: KeyframeMode,
    /// Enable error-resilient bitstream features.
    pub error_resilient: bool,
    /// Number of encoder threads.
    pub threads: usize,
    /// Frames of look-ahead; zero for realtime latency.
    pub lag_in_frames: u32,
    /// Speed/quality knob; higher is faster.
    pub cpu_used: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: VideoEncoding::Vp8,
            width: 0,
            height: 0,
            target_bitrate: 800,
            rate_control: RateControlMode::Cbr,
            keyframe_mode: KeyframeMode::Auto,
            error_resilient: true,
            threads: 1,
            lag_in_frames: 0,
            cpu_used: 8,
        }
    }
}

impl EncoderConfig {
    /// Create a config with dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the target bitrate in kilobits per second.
    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.target_bitrate = kbps;
        self
    }

    /// Set the rate control mode.
    pub fn with_rate_control(mut self, mode: RateControlMode) -> Self {
        self.rate_control = mode;
        self
    }

    /// Set the speed/quality knob.
    pub fn with_cpu_used(mut self, cpu_used: i32) -> Self {
        self.cpu_used = cpu_used;
        self
    }
}

/// Native frame storage sized to one raw frame.
///
/// Allocated and freed independently of the encoder context so a size
/// change can swap the image without touching rate control state.
pub struct ImageBuffer {
    layout: PixelLayout,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Allocate storage for one frame of the given geometry.
    pub fn new(layout: PixelLayout, width: u32, height: u32) -> Self {
        let len = layout.frame_size(width, height);
        Self {
            layout,
            width,
            height,
            data: vec![0u8; len],
        }
    }

    /// The pixel layout.
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Frame dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Byte length one frame must have.
    pub fn expected_len(&self) -> usize {
        self.data.len()
    }

    /// The frame bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy one raw frame into the buffer.
    ///
    /// Fails without touching the buffer when `src` is shorter than the
    /// frame geometry requires; surplus trailing bytes are ignored.
    pub fn import(&mut self, src: &[u8]) -> Result<()> {
        let needed = self.data.len();
        if src.len() < needed {
            return Err(VpxError::ShortFrame {
                needed,
                available: src.len(),
            });
        }
        self.data.copy_from_slice(&src[..needed]);
        Ok(())
    }
}

/// One compressed packet emitted by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpxPacket {
    /// Compressed bitstream bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp, as passed to the encode call.
    pub pts: i64,
    /// True when the packet is a self-contained keyframe.
    pub keyframe: bool,
}

/// One allocated encoder context.
///
/// Deliberately offers no live reconfiguration: rate control is fixed at
/// allocation and a frame-size change goes through the image buffer only.
pub trait VpxContext: Send {
    /// Encode one frame. Packets become available through
    /// [`VpxContext::next_packet`].
    fn encode(&mut self, image: &ImageBuffer, pts: i64, flags: EncodeFlags) -> Result<()>;

    /// Advance the per-frame packet iterator. `None` means the iterator is
    /// exhausted for the last encoded frame.
    fn next_packet(&mut self) -> Option<VpxPacket>;
}

/// The native compression library.
pub trait VpxLibrary: Send + Sync {
    /// Allocate native frame storage.
    fn alloc_image(&self, layout: PixelLayout, width: u32, height: u32) -> Result<ImageBuffer>;

    /// Allocate and configure an encoder context.
    fn new_context(&self, config: &EncoderConfig) -> Result<Box<dyn VpxContext>>;
}
