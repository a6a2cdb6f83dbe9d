//! Backend capability catalogs.
//!
//! A catalog is built fresh at pipeline-build time from whatever the
//! backend reports; it is never persisted and never global.

use vidbridge_core::format::{PixelLayout, VideoEncoding};

/// Whether a capability entry describes an encoder or a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecRole {
    /// Consumes raw frames, produces compressed packets.
    Encoder,
    /// Consumes compressed packets, produces raw frames.
    Decoder,
}

/// One codec a backend offers: its compressed encoding, its role, and the
/// pixel layouts it supports on the raw side.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityEntry {
    /// Compressed encoding handled by this codec.
    pub encoding: VideoEncoding,
    /// Encoder or decoder.
    pub role: CodecRole,
    /// Raw-side pixel layouts the codec supports.
    pub layouts: Vec<PixelLayout>,
}

impl CapabilityEntry {
    /// Create an encoder entry.
    pub fn encoder(encoding: VideoEncoding, layouts: Vec<PixelLayout>) -> Self {
        Self {
            encoding,
            role: CodecRole::Encoder,
            layouts,
        }
    }

    /// Create a decoder entry.
    pub fn decoder(encoding: VideoEncoding, layouts: Vec<PixelLayout>) -> Self {
        Self {
            encoding,
            role: CodecRole::Decoder,
            layouts,
        }
    }
}

/// An ordered, enumerable set of capability entries.
///
/// Order is significant: the negotiator preserves discovery order and the
/// first registered codec wins ties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityCatalog {
    entries: Vec<CapabilityEntry>,
}

impl CapabilityCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from entries, preserving their order.
    pub fn from_entries(entries: Vec<CapabilityEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: CapabilityEntry) {
        self.entries.push(entry);
    }

    /// Iterate the entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
