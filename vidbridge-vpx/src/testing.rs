//! Scripted fake of the native library, for tests.
//!
//! The fake never compresses anything: each encode call emits a scripted
//! number of marker packets so tests can assert the two-phase drain
//! protocol, keyframe forcing and failure handling without the native
//! library present. Allocation counters let tests prove that sessions
//! release what they allocate.

use crate::error::{Result, VpxError};
use crate::library::{EncodeFlags, EncoderConfig, ImageBuffer, VpxContext, VpxLibrary, VpxPacket};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vidbridge_core::format::PixelLayout;

/// Shared observation point for everything the fake library sees.
#[derive(Default)]
pub struct LibraryLog {
    /// Total image-buffer allocations.
    pub images_allocated: AtomicUsize,
    /// Contexts currently allocated (alloc minus drop).
    pub live_contexts: AtomicUsize,
    /// Total encode calls across all contexts.
    pub encode_calls: AtomicUsize,
    /// Flags of every encode call, in order.
    pub encode_flags: Mutex<Vec<EncodeFlags>>,
    /// Configs of every context allocation, in order.
    pub configs: Mutex<Vec<EncoderConfig>>,
}

impl LibraryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// A fake [`VpxLibrary`] with scripted packet counts and failures.
pub struct ScriptedLibrary {
    log: Arc<LibraryLog>,
    /// Packets to emit per encode call; the last entry repeats.
    packets_per_frame: Vec<usize>,
    /// Encode call indices (zero-based, per context) that fail.
    failing_calls: Vec<usize>,
    /// When set, `new_context` fails with this message.
    refuse_contexts: Option<String>,
}

impl ScriptedLibrary {
    /// One packet per frame, no failures.
    pub fn new(log: Arc<LibraryLog>) -> Self {
        Self {
            log,
            packets_per_frame: vec![1],
            failing_calls: Vec::new(),
            refuse_contexts: None,
        }
    }

    /// Script the packet count per encode call; the last entry repeats.
    pub fn with_packets_per_frame(mut self, counts: Vec<usize>) -> Self {
        assert!(!counts.is_empty());
        self.packets_per_frame = counts;
        self
    }

    /// Make the given encode calls (zero-based, per context) fail.
    pub fn with_failing_calls(mut self, calls: Vec<usize>) -> Self {
        self.failing_calls = calls;
        self
    }

    /// Make context allocation fail.
    pub fn refusing_contexts(mut self, reason: impl Into<String>) -> Self {
        self.refuse_contexts = Some(reason.into());
        self
    }
}

impl VpxLibrary for ScriptedLibrary {
    fn alloc_image(&self, layout: PixelLayout, width: u32, height: u32) -> Result<ImageBuffer> {
        self.log.images_allocated.fetch_add(1, Ordering::SeqCst);
        Ok(ImageBuffer::new(layout, width, height))
    }

    fn new_context(&self, config: &EncoderConfig) -> Result<Box<dyn VpxContext>> {
        if let Some(reason) = &self.refuse_contexts {
            return Err(VpxError::ContextAlloc(reason.clone()));
        }
        self.log.live_contexts.fetch_add(1, Ordering::SeqCst);
        self.log.configs.lock().push(config.clone());
        Ok(Box::new(ScriptedContext {
            log: Arc::clone(&self.log),
            packets_per_frame: self.packets_per_frame.clone(),
            failing_calls: self.failing_calls.clone(),
            call: 0,
            pending: VecDeque::new(),
            next_packet_id: 0,
        }))
    }
}

struct ScriptedContext {
    log: Arc<LibraryLog>,
    packets_per_frame: Vec<usize>,
    failing_calls: Vec<usize>,
    call: usize,
    pending: VecDeque<VpxPacket>,
    next_packet_id: u32,
}

impl VpxContext for ScriptedContext {
    fn encode(&mut self, image: &ImageBuffer, pts: i64, flags: EncodeFlags) -> Result<()> {
        let call = self.call;
        self.call += 1;
        self.log.encode_calls.fetch_add(1, Ordering::SeqCst);
        self.log.encode_flags.lock().push(flags);

        if self.failing_calls.contains(&call) {
            return Err(VpxError::Encode(format!("scripted failure on call {call}")));
        }

        let count = *self
            .packets_per_frame
            .get(call)
            .or_else(|| self.packets_per_frame.last())
            .unwrap_or(&1);
        let keyframe = call == 0 || flags.contains(EncodeFlags::FORCE_KEYFRAME);
        for _ in 0..count {
            let id = self.next_packet_id;
            self.next_packet_id += 1;
            // Marker payload: packet id then a copy of the first image byte.
            let first = image.data().first().copied().unwrap_or(0);
            self.pending.push_back(VpxPacket {
                data: vec![
                    (id >> 24) as u8,
                    (id >> 16) as u8,
                    (id >> 8) as u8,
                    id as u8,
                    first,
                ],
                pts,
                keyframe,
            });
        }
        Ok(())
    }

    fn next_packet(&mut self) -> Option<VpxPacket> {
        self.pending.pop_front()
    }
}

impl Drop for ScriptedContext {
    fn drop(&mut self) {
        self.log.live_contexts.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Read the packet id marker out of a scripted packet payload.
pub fn packet_id(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
