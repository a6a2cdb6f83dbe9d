//! The platform codec service, specified at its interface.
//!
//! Sessions are non-blocking throughout: dequeue-style calls return `None`
//! for "try again later" instead of waiting, which keeps the single
//! processing thread responsive to capture and render timing. Genuinely
//! unexpected backend statuses surface as [`HwError::Backend`].
//!
//! [`HwError::Backend`]: crate::error::HwError::Backend

use crate::error::Result;
use vidbridge_core::buffer::SurfaceToken;
use vidbridge_core::format::{PixelLayout, VideoEncoding};
use vidbridge_negotiate::CapabilityCatalog;

/// What a session is opened for.
///
/// Two requests comparing equal describe interchangeable sessions; the
/// adapter uses this to skip reinitialization on redundant reconfigures.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// The compressed encoding of the session.
    pub encoding: VideoEncoding,
    /// Raw-side pixel layout; `None` on the surface-bound decode path.
    pub layout: Option<PixelLayout>,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frames per second, when the caller knows it.
    pub frame_rate: Option<f64>,
    /// Target bitrate in bits per second, for encoders.
    pub bitrate: Option<u32>,
    /// True to open an encoder, false to open a decoder.
    pub encoder: bool,
    /// Display surface to render into, on the zero-copy decode path.
    pub surface: Option<SurfaceToken>,
}

/// A backend input buffer available for filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    /// Backend-side index of the slot.
    pub index: usize,
    /// Bytes the slot can accept.
    pub capacity: usize,
}

/// One unit of backend output.
#[derive(Debug)]
pub enum OutputUnit {
    /// Encoded or decoded bytes copied out of the backend queue.
    Bytes {
        data: Vec<u8>,
        pts: i64,
        keyframe: bool,
    },
    /// The frame was rendered directly into the bound surface; no bytes
    /// cross the data path.
    Rendered { pts: i64 },
}

/// One open backend codec session.
///
/// `stop` and `release` are separate so teardown can release the handle
/// even when stopping fails; callers must invoke them in that order.
pub trait CodecHandle: Send {
    /// Dequeue an input slot. `None` means try again later.
    fn dequeue_input(&mut self) -> Result<Option<InputSlot>>;

    /// Queue `data` into a previously dequeued slot.
    fn queue_input(&mut self, slot: InputSlot, data: &[u8], pts: i64) -> Result<()>;

    /// Dequeue one unit of output. `None` means try again later.
    fn dequeue_output(&mut self) -> Result<Option<OutputUnit>>;

    /// Stop the session.
    fn stop(&mut self) -> Result<()>;

    /// Release the backend resources. Must be safe after a failed `stop`.
    fn release(&mut self);
}

/// The platform hardware codec service.
pub trait CodecService: Send + Sync {
    /// Enumerate the codecs the service offers.
    ///
    /// Queried fresh per pipeline build; the catalog is never cached
    /// process-wide.
    fn capabilities(&self) -> CapabilityCatalog;

    /// Allocate and start a codec session.
    fn open_codec(&self, request: &SessionRequest) -> Result<Box<dyn CodecHandle>>;
}
