//! # Vidbridge VPX
//!
//! Software video compression over a native VPX-style realtime library.
//!
//! The native library is an external collaborator specified at its
//! interface ([`VpxLibrary`]/[`VpxContext`]): it allocates image buffers
//! and encoder contexts, encodes one frame at a time, and emits compressed
//! packets through a per-frame iterator. [`VpxCompressor`] drives that
//! surface behind the common stage contract, including the two-phase
//! encode-then-drain protocol and the resize/keyframe policy.

pub mod error;
pub mod library;
pub mod compressor;
pub mod testing;

pub use error::{Result, VpxError};
pub use library::{
    EncodeFlags, EncoderConfig, ImageBuffer, KeyframeMode, RateControlMode, VpxContext,
    VpxLibrary, VpxPacket,
};
pub use compressor::{software_capabilities, VpxCompressor};
