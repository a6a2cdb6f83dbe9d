//! Hardware adapter integration tests.
//!
//! Drives [`HwVideoStage`] against a mock codec service to verify the
//! exhaust-then-feed discipline, partial input consumption, reconfigure
//! behavior and teardown guarantees.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vidbridge_core::buffer::{Buffer, BufferPayload, SurfaceToken};
use vidbridge_core::format::{FormatDescriptor, PixelLayout, VideoEncoding};
use vidbridge_core::stage::{SessionState, Stage};
use vidbridge_hw::{
    CodecHandle, CodecService, HwError, HwVideoStage, InputSlot, OutputUnit, SessionRequest,
};
use vidbridge_negotiate::{CapabilityCatalog, CapabilityEntry};

// =============================================================================
// Mock service and handle
// =============================================================================

#[derive(Default)]
struct ServiceLog {
    requests: Mutex<Vec<SessionRequest>>,
    stops: AtomicUsize,
    releases: AtomicUsize,
    queued: Mutex<Vec<Vec<u8>>>,
}

struct MockHandle {
    log: Arc<ServiceLog>,
    /// Scripted input slots; when exhausted, a default slot is offered.
    input_slots: VecDeque<Option<InputSlot>>,
    /// Scripted outputs; when exhausted, none are pending.
    outputs: VecDeque<Option<OutputUnit>>,
    default_capacity: usize,
    fail_stop: bool,
    /// Unexpected backend code returned by the next dequeue_output.
    poison_output: Option<i32>,
}

impl CodecHandle for MockHandle {
    fn dequeue_input(&mut self) -> vidbridge_hw::Result<Option<InputSlot>> {
        match self.input_slots.pop_front() {
            Some(slot) => Ok(slot),
            None => Ok(Some(InputSlot {
                index: 0,
                capacity: self.default_capacity,
            })),
        }
    }

    fn queue_input(
        &mut self,
        _slot: InputSlot,
        data: &[u8],
        _pts: i64,
    ) -> vidbridge_hw::Result<()> {
        self.log.queued.lock().push(data.to_vec());
        Ok(())
    }

    fn dequeue_output(&mut self) -> vidbridge_hw::Result<Option<OutputUnit>> {
        if let Some(code) = self.poison_output.take() {
            return Err(HwError::Backend {
                operation: "dequeue_output",
                code,
            });
        }
        Ok(self.outputs.pop_front().flatten())
    }

    fn stop(&mut self) -> vidbridge_hw::Result<()> {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            Err(HwError::Backend {
                operation: "stop",
                code: -38,
            })
        } else {
            Ok(())
        }
    }

    fn release(&mut self) {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockService {
    log: Arc<ServiceLog>,
    catalog: CapabilityCatalog,
    /// Prepared handles, one per expected open; empty falls back to a
    /// plain handle with a large input slot and no pending output.
    prepared: Mutex<VecDeque<MockHandle>>,
    refuse_open: bool,
}

impl MockService {
    fn new(log: Arc<ServiceLog>) -> Self {
        Self {
            log,
            catalog: CapabilityCatalog::from_entries(vec![
                CapabilityEntry::encoder(VideoEncoding::H264, vec![PixelLayout::I420]),
                CapabilityEntry::decoder(VideoEncoding::H264, vec![PixelLayout::I420]),
            ]),
            prepared: Mutex::new(VecDeque::new()),
            refuse_open: false,
        }
    }

    fn refusing(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    fn prepare(self, handle: MockHandle) -> Self {
        self.prepared.lock().push_back(handle);
        self
    }

    fn plain_handle(log: &Arc<ServiceLog>) -> MockHandle {
        MockHandle {
            log: Arc::clone(log),
            input_slots: VecDeque::new(),
            outputs: VecDeque::new(),
            default_capacity: 1 << 20,
            fail_stop: false,
            poison_output: None,
        }
    }
}

impl CodecService for MockService {
    fn capabilities(&self) -> CapabilityCatalog {
        self.catalog.clone()
    }

    fn open_codec(
        &self,
        request: &SessionRequest,
    ) -> vidbridge_hw::Result<Box<dyn CodecHandle>> {
        if self.refuse_open {
            return Err(HwError::ResourceUnavailable("no codec instances".into()));
        }
        self.log.requests.lock().push(request.clone());
        let handle = self
            .prepared
            .lock()
            .pop_front()
            .unwrap_or_else(|| Self::plain_handle(&self.log));
        Ok(Box::new(handle))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn raw(width: u32, height: u32) -> FormatDescriptor {
    FormatDescriptor::raw(PixelLayout::I420).with_dimensions(width, height)
}

fn h264(width: u32, height: u32) -> FormatDescriptor {
    FormatDescriptor::new(VideoEncoding::H264).with_dimensions(width, height)
}

fn open_encoder(service: MockService, width: u32, height: u32) -> HwVideoStage {
    let mut stage = HwVideoStage::new("hw-enc", Arc::new(service)).with_bitrate(800_000);
    stage.set_input_format(raw(width, height)).unwrap();
    stage.set_output_format(h264(width, height)).unwrap();
    stage.open().unwrap();
    assert_eq!(stage.state(), SessionState::Ready);
    stage
}

// =============================================================================
// Open / reconfigure
// =============================================================================

#[test]
fn test_open_is_noop_until_formats_set() {
    let log = Arc::new(ServiceLog::default());
    let mut stage = HwVideoStage::new("hw", Arc::new(MockService::new(Arc::clone(&log))));

    stage.open().unwrap();
    assert_eq!(stage.state(), SessionState::Closed);

    stage.set_input_format(raw(640, 480)).unwrap();
    stage.open().unwrap();
    assert_eq!(stage.state(), SessionState::Closed);
    assert!(log.requests.lock().is_empty());
}

#[test]
fn test_open_resource_unavailable_stays_closed() {
    let log = Arc::new(ServiceLog::default());
    let service = MockService::new(Arc::clone(&log)).refusing();
    let mut stage = HwVideoStage::new("hw", Arc::new(service));
    stage.set_input_format(raw(640, 480)).unwrap();
    stage.set_output_format(h264(640, 480)).unwrap();

    assert!(stage.open().is_err());
    assert_eq!(stage.state(), SessionState::Closed);
}

#[test]
fn test_redundant_open_keeps_handle() {
    let log = Arc::new(ServiceLog::default());
    let mut stage = open_encoder(MockService::new(Arc::clone(&log)), 640, 480);

    stage.open().unwrap();
    stage.open().unwrap();
    assert_eq!(log.requests.lock().len(), 1);
    assert_eq!(log.releases.load(Ordering::SeqCst), 0);
}

#[test]
fn test_size_change_closes_before_reopen() {
    let log = Arc::new(ServiceLog::default());
    let mut stage = open_encoder(MockService::new(Arc::clone(&log)), 640, 480);

    // Orientation flip mid-call.
    stage.set_input_format(raw(480, 640)).unwrap();
    stage.set_output_format(h264(480, 640)).unwrap();

    assert_eq!(stage.state(), SessionState::Ready);
    // Old handle was stopped and released before the new open.
    assert_eq!(log.stops.load(Ordering::SeqCst), 1);
    assert_eq!(log.releases.load(Ordering::SeqCst), 1);
    let requests = log.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!((requests[1].width, requests[1].height), (480, 640));
}

#[test]
fn test_release_runs_even_when_stop_fails() {
    let log = Arc::new(ServiceLog::default());
    let handle = MockHandle {
        fail_stop: true,
        ..MockService::plain_handle(&log)
    };
    let service = MockService::new(Arc::clone(&log)).prepare(handle);
    let mut stage = open_encoder(service, 640, 480);

    stage.close();
    assert_eq!(stage.state(), SessionState::Closed);
    assert_eq!(log.stops.load(Ordering::SeqCst), 1);
    assert_eq!(log.releases.load(Ordering::SeqCst), 1);

    // Idempotent: a second close touches nothing.
    stage.close();
    assert_eq!(log.releases.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Processing
// =============================================================================

#[test]
fn test_exhaust_before_feed() {
    let log = Arc::new(ServiceLog::default());
    let mut handle = MockService::plain_handle(&log);
    handle.outputs.push_back(Some(OutputUnit::Bytes {
        data: vec![0xAA; 32],
        pts: 500,
        keyframe: true,
    }));
    let service = MockService::new(Arc::clone(&log)).prepare(handle);
    let mut stage = open_encoder(service, 640, 480);

    let mut input = Buffer::from_data(vec![1u8; 64]).with_pts(1000);
    let mut output = Buffer::empty();

    // First call drains the pending output and leaves the input alone.
    let status = stage.process(&mut input, &mut output).unwrap();
    assert!(!status.input_consumed());
    assert!(status.output_filled());
    assert_eq!(output.data().unwrap(), &[0xAA; 32]);
    assert_eq!(output.pts, 500);
    assert!(input.remaining() == 64);
    assert!(log.queued.lock().is_empty());

    // Second call finds no output and feeds the input.
    let mut output = Buffer::empty();
    let status = stage.process(&mut input, &mut output).unwrap();
    assert!(status.input_consumed());
    assert!(!status.output_filled());
    assert_eq!(log.queued.lock().len(), 1);
}

#[test]
fn test_partial_consumption_accounts_every_byte() {
    let log = Arc::new(ServiceLog::default());
    let mut handle = MockService::plain_handle(&log);
    // Slots smaller than the frame: 40 + 40 + 20.
    handle.input_slots.push_back(Some(InputSlot {
        index: 0,
        capacity: 40,
    }));
    handle.input_slots.push_back(Some(InputSlot {
        index: 1,
        capacity: 40,
    }));
    let service = MockService::new(Arc::clone(&log)).prepare(handle);
    let mut stage = open_encoder(service, 640, 480);

    let payload: Vec<u8> = (0..100u8).collect();
    let mut input = Buffer::from_data(payload.clone());
    let mut calls = 0;
    loop {
        let mut output = Buffer::empty();
        let status = stage.process(&mut input, &mut output).unwrap();
        calls += 1;
        if status.input_consumed() {
            break;
        }
        assert!(calls < 10, "input never consumed");
    }

    assert_eq!(calls, 3);
    assert_eq!(input.remaining(), 0);
    // Every byte crossed exactly once, in order.
    let queued = log.queued.lock();
    let total: Vec<u8> = queued.iter().flatten().copied().collect();
    assert_eq!(total, payload);
}

#[test]
fn test_no_input_slot_is_try_again_not_an_error() {
    let log = Arc::new(ServiceLog::default());
    let mut handle = MockService::plain_handle(&log);
    handle.input_slots.push_back(None);
    let service = MockService::new(Arc::clone(&log)).prepare(handle);
    let mut stage = open_encoder(service, 640, 480);

    let mut input = Buffer::from_data(vec![0u8; 16]);
    let mut output = Buffer::empty();
    let status = stage.process(&mut input, &mut output).unwrap();
    assert!(!status.input_consumed());
    assert!(!status.output_filled());
    assert_eq!(input.remaining(), 16);

    // The next call succeeds once a slot frees up.
    let status = stage.process(&mut input, &mut output).unwrap();
    assert!(status.input_consumed());
}

#[test]
fn test_unexpected_backend_code_is_fatal() {
    let log = Arc::new(ServiceLog::default());
    let mut handle = MockService::plain_handle(&log);
    handle.poison_output = Some(-10_000);
    let service = MockService::new(Arc::clone(&log)).prepare(handle);
    let mut stage = open_encoder(service, 640, 480);

    let mut input = Buffer::from_data(vec![0u8; 16]);
    let mut output = Buffer::empty();
    assert!(stage.process(&mut input, &mut output).is_err());
}

#[test]
fn test_process_on_closed_session_fails() {
    let log = Arc::new(ServiceLog::default());
    let mut stage = HwVideoStage::new("hw", Arc::new(MockService::new(log)));
    let mut input = Buffer::from_data(vec![0u8; 16]);
    let mut output = Buffer::empty();
    assert!(stage.process(&mut input, &mut output).is_err());
}

// =============================================================================
// Surface path
// =============================================================================

#[test]
fn test_rendered_output_carries_surface_token() {
    let log = Arc::new(ServiceLog::default());
    let mut handle = MockService::plain_handle(&log);
    handle
        .outputs
        .push_back(Some(OutputUnit::Rendered { pts: 42 }));
    let service = MockService::new(Arc::clone(&log)).prepare(handle);

    let token = SurfaceToken(0xBEEF);
    let mut stage = HwVideoStage::new("hw-dec", Arc::new(service)).with_surface(token);
    stage.set_input_format(h264(1280, 720)).unwrap();
    stage
        .set_output_format(FormatDescriptor::opaque_surface().with_dimensions(1280, 720))
        .unwrap();
    stage.open().unwrap();

    // The open request carried the surface binding.
    assert_eq!(log.requests.lock()[0].surface, Some(token));

    let mut input = Buffer::from_data(vec![0u8; 16]);
    let mut output = Buffer::empty();
    let status = stage.process(&mut input, &mut output).unwrap();
    assert!(!status.input_consumed());
    assert!(output.is_filled());
    assert_eq!(output.surface(), Some(token));
    assert!(matches!(output.payload(), BufferPayload::Surface(_)));
}

#[test]
fn test_surface_output_without_binding_fails_open() {
    let log = Arc::new(ServiceLog::default());
    let service = MockService::new(log);
    let mut stage = HwVideoStage::new("hw-dec", Arc::new(service));
    stage.set_input_format(h264(1280, 720)).unwrap();
    stage
        .set_output_format(FormatDescriptor::opaque_surface().with_dimensions(1280, 720))
        .unwrap();
    assert!(stage.open().is_err());
    assert_eq!(stage.state(), SessionState::Closed);
}

// =============================================================================
// Pool hygiene
// =============================================================================

#[test]
fn test_close_drains_pool_to_baseline() {
    let log = Arc::new(ServiceLog::default());
    let mut handle = MockService::plain_handle(&log);
    for i in 0..3 {
        handle.outputs.push_back(Some(OutputUnit::Bytes {
            data: vec![i as u8; 100],
            pts: i,
            keyframe: false,
        }));
    }
    let service = MockService::new(Arc::clone(&log)).prepare(handle);
    let mut stage = open_encoder(service, 640, 480);

    let mut input = Buffer::from_data(vec![0u8; 8]);
    for _ in 0..3 {
        let mut output = Buffer::empty();
        stage.process(&mut input, &mut output).unwrap();
        // Returning the payload through the pool models the downstream
        // consumer handing the lease back.
        if let BufferPayload::Data(data) = output.take_payload() {
            stage.pool().release(data);
        }
    }
    assert!(stage.pool().available() > 0);

    stage.close();
    assert_eq!(stage.pool().available(), 0);
    assert_eq!(stage.pool().outstanding(), 0);
}
