//! The unit of data exchanged between stages.
//!
//! A [`Buffer`] carries exactly one payload kind at a time: leased byte
//! storage, an opaque surface token, or nothing. Byte storage belongs to the
//! [`BufferPool`](crate::pool::BufferPool) that leased it; a stage holds it
//! only for the duration of one `process()` call chain and returns it
//! through the pool.

use crate::format::FormatDescriptor;
use crate::pool::SharedBufferPool;
use bitflags::bitflags;
use std::fmt;

/// Opaque handle to a renderer-owned display surface.
///
/// The codec layer neither creates nor destroys the surface behind the
/// token; the rendering collaborator guarantees it outlives any session
/// bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceToken(pub u64);

bitflags! {
    /// Flags describing the state of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// The consumer should drop this buffer without using it.
        const DISCARD = 0x0001;
        /// A stage wrote output into this buffer.
        const FILLED = 0x0002;
        /// The producer's data has been fully consumed.
        const CONSUMED = 0x0004;
        /// The payload is a self-contained keyframe.
        const KEYFRAME = 0x0008;
    }
}

/// Payload of a buffer. A buffer never holds two kinds at once.
#[derive(Debug, Default)]
pub enum BufferPayload {
    /// No payload.
    #[default]
    Empty,
    /// Byte storage leased from a buffer pool.
    Data(Vec<u8>),
    /// Opaque surface token; the data path is bypassed.
    Surface(SurfaceToken),
}

impl BufferPayload {
    fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Data(_) => "data",
            Self::Surface(_) => "surface",
        }
    }
}

/// A frame-sized unit of raw or compressed video data.
pub struct Buffer {
    payload: BufferPayload,
    /// Byte offset of the valid region within a data payload.
    pub offset: usize,
    /// Byte length of the valid region within a data payload.
    pub length: usize,
    /// Presentation timestamp in microseconds.
    pub pts: i64,
    /// State flags.
    pub flags: BufferFlags,
    /// Format of the payload, when known.
    pub format: Option<FormatDescriptor>,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn empty() -> Self {
        Self {
            payload: BufferPayload::Empty,
            offset: 0,
            length: 0,
            pts: 0,
            flags: BufferFlags::empty(),
            format: None,
        }
    }

    /// Create a buffer over leased byte storage, valid for `data.len()` bytes.
    pub fn from_data(data: Vec<u8>) -> Self {
        let length = data.len();
        Self {
            payload: BufferPayload::Data(data),
            offset: 0,
            length,
            pts: 0,
            flags: BufferFlags::empty(),
            format: None,
        }
    }

    /// Create a buffer naming a display surface.
    pub fn from_surface(token: SurfaceToken) -> Self {
        Self {
            payload: BufferPayload::Surface(token),
            offset: 0,
            length: 0,
            pts: 0,
            flags: BufferFlags::empty(),
            format: None,
        }
    }

    /// Set the presentation timestamp.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = pts;
        self
    }

    /// Set the format.
    pub fn with_format(mut self, format: FormatDescriptor) -> Self {
        self.format = Some(format);
        self
    }

    /// Get the payload.
    pub fn payload(&self) -> &BufferPayload {
        &self.payload
    }

    /// Bytes remaining in the valid region.
    pub fn remaining(&self) -> usize {
        self.length
    }

    /// The valid region of a data payload, or an error for other kinds.
    pub fn data(&self) -> crate::Result<&[u8]> {
        match &self.payload {
            BufferPayload::Data(d) => Ok(&d[self.offset..self.offset + self.length]),
            other => Err(crate::Error::PayloadMismatch {
                expected: "data",
                found: other.kind(),
            }),
        }
    }

    /// The surface token, if that is what the buffer holds.
    pub fn surface(&self) -> Option<SurfaceToken> {
        match self.payload {
            BufferPayload::Surface(token) => Some(token),
            _ => None,
        }
    }

    /// Advance past `n` consumed bytes, in place.
    ///
    /// Used by stages that accept partial input: the caller re-invokes
    /// `process()` with the same buffer until [`Buffer::remaining`] is zero.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.length);
        self.offset += n;
        self.length -= n;
        if self.length == 0 {
            self.flags.insert(BufferFlags::CONSUMED);
        }
    }

    /// Replace the payload with byte storage of at least `capacity` bytes.
    ///
    /// Existing storage that is already large enough is kept; otherwise it
    /// goes back to the pool and a larger lease replaces it. Offset and
    /// length are reset to cover nothing.
    pub fn ensure_capacity(&mut self, capacity: usize, pool: &SharedBufferPool) {
        let keep = matches!(&self.payload, BufferPayload::Data(d) if d.len() >= capacity);
        if !keep {
            if let BufferPayload::Data(old) = std::mem::take(&mut self.payload) {
                pool.release(old);
            }
            self.payload = BufferPayload::Data(pool.acquire(capacity));
        }
        self.offset = 0;
        self.length = 0;
    }

    /// Fill the buffer from `src`, setting the valid region and FILLED flag.
    ///
    /// The payload must already be data storage of sufficient size; use
    /// [`Buffer::ensure_capacity`] first.
    pub fn fill_from(&mut self, src: &[u8]) -> crate::Result<()> {
        match &mut self.payload {
            BufferPayload::Data(d) => {
                if d.len() < src.len() {
                    return Err(crate::Error::BufferTooSmall {
                        needed: src.len(),
                        available: d.len(),
                    });
                }
                d[..src.len()].copy_from_slice(src);
                self.offset = 0;
                self.length = src.len();
                self.flags.insert(BufferFlags::FILLED);
                Ok(())
            }
            other => Err(crate::Error::PayloadMismatch {
                expected: "data",
                found: other.kind(),
            }),
        }
    }

    /// Replace the payload with a surface token and mark the buffer filled.
    ///
    /// Any byte storage previously held is returned to the pool.
    pub fn fill_surface(&mut self, token: SurfaceToken, pool: &SharedBufferPool) {
        if let BufferPayload::Data(old) = std::mem::take(&mut self.payload) {
            pool.release(old);
        }
        self.payload = BufferPayload::Surface(token);
        self.offset = 0;
        self.length = 0;
        self.flags.insert(BufferFlags::FILLED);
    }

    /// Take the payload out, leaving the buffer empty.
    pub fn take_payload(&mut self) -> BufferPayload {
        self.offset = 0;
        self.length = 0;
        std::mem::take(&mut self.payload)
    }

    /// Clear flags and region markers for reuse. The payload is kept.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.length = 0;
        self.pts = 0;
        self.flags = BufferFlags::empty();
    }

    /// Check the discard flag.
    pub fn is_discarded(&self) -> bool {
        self.flags.contains(BufferFlags::DISCARD)
    }

    /// Check the filled flag.
    pub fn is_filled(&self) -> bool {
        self.flags.contains(BufferFlags::FILLED)
    }

    /// Set the discard flag.
    pub fn mark_discard(&mut self) {
        self.flags.insert(BufferFlags::DISCARD);
    }

    /// Set the keyframe flag.
    pub fn set_keyframe(&mut self, keyframe: bool) {
        if keyframe {
            self.flags.insert(BufferFlags::KEYFRAME);
        } else {
            self.flags.remove(BufferFlags::KEYFRAME);
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("payload", &self.payload.kind())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("pts", &self.pts)
            .field("flags", &self.flags)
            .finish()
    }
}
