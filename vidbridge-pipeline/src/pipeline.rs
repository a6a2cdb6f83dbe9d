//! Pipeline construction and the frame drive loop.

use crate::error::{PipelineError, Result};
use crate::passthrough::SurfacePassthrough;
use crate::settings::StreamSettings;
use std::sync::Arc;
use tracing::{debug, info};
use vidbridge_core::buffer::{Buffer, SurfaceToken};
use vidbridge_core::format::FormatDescriptor;
use vidbridge_core::stage::{ProcessStatus, SessionState, Stage};
use vidbridge_hw::{CodecService, HwVideoStage};
use vidbridge_negotiate::{negotiate, NegotiationResult};
use vidbridge_vpx::{software_capabilities, VpxCompressor, VpxLibrary};

/// Which backend a stage runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Platform hardware codec service.
    Hardware,
    /// Software compressor.
    Software,
    /// Data-less surface passthrough.
    Passthrough,
}

/// The backend chosen at build time, fixed for the pipeline's lifetime.
///
/// Dispatch is a plain `match`: every variant implements the same
/// open/process/close contract and nothing else selects between them after
/// construction.
pub enum VideoStage {
    /// Hardware codec adapter.
    Hardware(HwVideoStage),
    /// Software compressor.
    Software(VpxCompressor),
    /// Surface passthrough.
    Passthrough(SurfacePassthrough),
}

impl VideoStage {
    /// Which backend this stage runs on.
    pub fn kind(&self) -> BackendKind {
        match self {
            VideoStage::Hardware(_) => BackendKind::Hardware,
            VideoStage::Software(_) => BackendKind::Software,
            VideoStage::Passthrough(_) => BackendKind::Passthrough,
        }
    }

    /// Stage name, for logs.
    pub fn name(&self) -> &str {
        match self {
            VideoStage::Hardware(s) => s.name(),
            VideoStage::Software(s) => s.name(),
            VideoStage::Passthrough(s) => s.name(),
        }
    }

    /// Set the input format.
    pub fn set_input_format(&mut self, format: FormatDescriptor) -> vidbridge_core::Result<()> {
        match self {
            VideoStage::Hardware(s) => s.set_input_format(format),
            VideoStage::Software(s) => s.set_input_format(format),
            VideoStage::Passthrough(s) => s.set_input_format(format),
        }
    }

    /// Set the output format.
    pub fn set_output_format(&mut self, format: FormatDescriptor) -> vidbridge_core::Result<()> {
        match self {
            VideoStage::Hardware(s) => s.set_output_format(format),
            VideoStage::Software(s) => s.set_output_format(format),
            VideoStage::Passthrough(s) => s.set_output_format(format),
        }
    }

    /// Get the output format.
    pub fn output_format(&self) -> Option<FormatDescriptor> {
        match self {
            VideoStage::Hardware(s) => s.output_format(),
            VideoStage::Software(s) => s.output_format(),
            VideoStage::Passthrough(s) => s.output_format(),
        }
    }

    /// Open the stage.
    pub fn open(&mut self) -> vidbridge_core::Result<()> {
        match self {
            VideoStage::Hardware(s) => s.open(),
            VideoStage::Software(s) => s.open(),
            VideoStage::Passthrough(s) => s.open(),
        }
    }

    /// Process one step.
    pub fn process(
        &mut self,
        input: &mut Buffer,
        output: &mut Buffer,
    ) -> vidbridge_core::Result<ProcessStatus> {
        match self {
            VideoStage::Hardware(s) => s.process(input, output),
            VideoStage::Software(s) => s.process(input, output),
            VideoStage::Passthrough(s) => s.process(input, output),
        }
    }

    /// Close the stage.
    pub fn close(&mut self) {
        match self {
            VideoStage::Hardware(s) => s.close(),
            VideoStage::Software(s) => s.close(),
            VideoStage::Passthrough(s) => s.close(),
        }
    }

    /// Get the session state.
    pub fn state(&self) -> SessionState {
        match self {
            VideoStage::Hardware(s) => s.state(),
            VideoStage::Software(s) => s.state(),
            VideoStage::Passthrough(s) => s.state(),
        }
    }
}

/// Outcome of driving one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// The input frame was fully consumed.
    Completed,
    /// The backend asked to try again later; re-invoke with the same
    /// buffer on the next tick. Nothing blocks in between.
    Pending,
}

/// Builder for one video pipeline instance.
pub struct PipelineBuilder {
    input_format: Option<FormatDescriptor>,
    settings: StreamSettings,
    service: Option<Arc<dyn CodecService>>,
    library: Option<Arc<dyn VpxLibrary>>,
    surface: Option<SurfaceToken>,
}

impl PipelineBuilder {
    /// Create a builder.
    pub fn new() -> Self {
        Self {
            input_format: None,
            settings: StreamSettings::default(),
            service: None,
            library: None,
            surface: None,
        }
    }

    /// Set the input format the upstream source produces.
    pub fn input_format(mut self, format: FormatDescriptor) -> Self {
        self.input_format = Some(format);
        self
    }

    /// Set the host-supplied stream settings.
    pub fn settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Offer the platform hardware codec service as a backend candidate.
    pub fn hardware(mut self, service: Arc<dyn CodecService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Offer the software compression library as a backend candidate.
    pub fn software(mut self, library: Arc<dyn VpxLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    /// Bind a display surface for the zero-copy decode path.
    pub fn surface(mut self, token: SurfaceToken) -> Self {
        self.surface = Some(token);
        self
    }

    /// Negotiate a backend and build the pipeline.
    ///
    /// Candidates are tried in order: hardware, then software. An input no
    /// candidate can satisfy yields [`PipelineError::Negotiation`]; the
    /// surrounding session is expected to continue without video
    /// processing rather than fail.
    pub fn build(self) -> Result<Pipeline> {
        let mut input = self
            .input_format
            .clone()
            .ok_or_else(|| PipelineError::InvalidConfig("input format not set".into()))?;

        // Orientation is applied once here; a later rotation arrives as a
        // reconfigure with swapped dimensions.
        if let Some((w, h)) = input.dimensions() {
            let (w, h) = self.settings.orientation.apply(w, h);
            input = input.with_dimensions(w, h);
        }

        if let Some(service) = self.service.clone() {
            let catalog = service.capabilities();
            let outputs = negotiate(&input, &catalog);
            if !outputs.is_empty() {
                return self.build_hardware(service, input, outputs);
            }
            debug!(input = %input, "hardware negotiation empty, falling back");
        }

        if let Some(library) = self.library.clone() {
            let outputs = negotiate(&input, &software_capabilities());
            if !outputs.is_empty() {
                return self.build_software(library, input, outputs);
            }
            debug!(input = %input, "software negotiation empty, falling back");
        }

        Err(PipelineError::Negotiation(input))
    }

    fn build_hardware(
        self,
        service: Arc<dyn CodecService>,
        input: FormatDescriptor,
        outputs: Vec<FormatDescriptor>,
    ) -> Result<Pipeline> {
        let encoder = outputs[0].encoding.is_compressed();

        // A bound surface turns the decode path into zero-copy rendering:
        // the adapter's output format becomes the opaque surface and a
        // passthrough keeps the graph shape intact downstream.
        let (output, passthrough) = if !encoder && self.surface.is_some() {
            let mut surface_format = FormatDescriptor::opaque_surface();
            surface_format.width = input.width;
            surface_format.height = input.height;
            surface_format.frame_rate = input.frame_rate;
            (surface_format, true)
        } else {
            (outputs[0].clone(), false)
        };

        let negotiation = NegotiationResult::build(&input, std::slice::from_ref(&output), encoder);

        let mut stage = HwVideoStage::new("hw-codec", service)
            .with_bitrate(self.settings.target_bitrate)
            .with_frame_rate(self.settings.frame_rate);
        if let Some(token) = self.surface {
            stage = stage.with_surface(token);
        }
        let mut stage = VideoStage::Hardware(stage);
        stage.set_input_format(input)?;
        stage.set_output_format(output.clone())?;
        stage.open()?;

        let mut stages = vec![stage];
        if passthrough {
            let mut tail = SurfacePassthrough::new("surface-passthrough");
            tail.set_input_format(output.clone())?;
            tail.set_output_format(output)?;
            tail.open()?;
            stages.push(VideoStage::Passthrough(tail));
        }

        info!(backend = "hardware", stages = stages.len(), "pipeline built");
        Ok(Pipeline::new(stages, negotiation))
    }

    fn build_software(
        self,
        library: Arc<dyn VpxLibrary>,
        input: FormatDescriptor,
        outputs: Vec<FormatDescriptor>,
    ) -> Result<Pipeline> {
        let output = outputs[0].clone();
        let negotiation = NegotiationResult::build(&input, &outputs, true);

        let stage = VpxCompressor::new("sw-compressor", library)
            .with_bitrate(self.settings.target_bitrate / 1000);
        let mut stage = VideoStage::Software(stage);
        stage.set_input_format(input)?;
        stage.set_output_format(output)?;
        stage.open()?;

        info!(backend = "software", "pipeline built");
        Ok(Pipeline::new(vec![stage], negotiation))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One built video pipeline: the selected stages plus the negotiation
/// record, driven by a single upstream thread.
pub struct Pipeline {
    stages: Vec<VideoStage>,
    negotiation: NegotiationResult,
    frames_in: u64,
    outputs_delivered: u64,
    frames_discarded: u64,
}

impl Pipeline {
    fn new(stages: Vec<VideoStage>, negotiation: NegotiationResult) -> Self {
        Self {
            stages,
            negotiation,
            frames_in: 0,
            outputs_delivered: 0,
            frames_discarded: 0,
        }
    }

    /// Create a builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// The stages in processing order.
    pub fn stages(&self) -> &[VideoStage] {
        &self.stages
    }

    /// The backend the head stage runs on.
    pub fn backend(&self) -> BackendKind {
        self.stages[0].kind()
    }

    /// The negotiation record this pipeline was built from.
    pub fn negotiation(&self) -> &NegotiationResult {
        &self.negotiation
    }

    /// Number of frames accepted by [`Pipeline::process_frame`].
    pub fn frames_in(&self) -> u64 {
        self.frames_in
    }

    /// Number of outputs handed to sinks.
    pub fn outputs_delivered(&self) -> u64 {
        self.outputs_delivered
    }

    /// Number of outputs dropped via the discard flag.
    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    /// Drive one input frame, forwarding every produced output to `sink`.
    ///
    /// Re-invokes the head stage until it reports the input consumed. When
    /// the backend reports try-again with no forward progress the call
    /// returns [`Drive::Pending`] instead of blocking; the driver retries
    /// on its next tick with the same (partially consumed) buffer.
    pub fn process_frame(
        &mut self,
        input: &mut Buffer,
        sink: &mut dyn FnMut(Buffer),
    ) -> Result<Drive> {
        loop {
            let before = input.remaining();
            let mut output = Buffer::empty();
            let (head, tail) = self
                .stages
                .split_first_mut()
                .ok_or_else(|| PipelineError::InvalidConfig("pipeline has no stages".into()))?;
            let status = head.process(input, &mut output)?;

            let mut delivered = false;
            if output.is_discarded() {
                self.frames_discarded += 1;
            } else if output.is_filled() {
                delivered = true;
                if let Some(final_out) = Self::run_tail(tail, output)? {
                    self.outputs_delivered += 1;
                    sink(final_out);
                }
            }

            if status.input_consumed() {
                self.frames_in += 1;
                return Ok(Drive::Completed);
            }
            let progressed = delivered || input.remaining() < before;
            if !progressed {
                return Ok(Drive::Pending);
            }
        }
    }

    /// Push a filled buffer through the downstream stages. Returns `None`
    /// when a stage absorbs it (the passthrough around a zero-copy render).
    fn run_tail(tail: &mut [VideoStage], buffer: Buffer) -> Result<Option<Buffer>> {
        let mut current = buffer;
        for stage in tail {
            let mut next = Buffer::empty();
            stage.process(&mut current, &mut next)?;
            if !next.is_filled() {
                return Ok(None);
            }
            current = next;
        }
        Ok(Some(current))
    }

    /// Apply a new input format (a resolution or orientation change).
    ///
    /// The head stage decides whether its live handle still matches; only
    /// an incompatible change pays for a close-and-reopen.
    pub fn reconfigure(&mut self, input: FormatDescriptor) -> Result<()> {
        let head = self
            .stages
            .first_mut()
            .ok_or_else(|| PipelineError::InvalidConfig("pipeline has no stages".into()))?;
        let mut output = head
            .output_format()
            .ok_or_else(|| PipelineError::InvalidConfig("head stage has no output format".into()))?;
        output.width = input.width;
        output.height = input.height;
        head.set_input_format(input)?;
        head.set_output_format(output)?;
        head.open()?;
        Ok(())
    }

    /// Close every stage. Resource release is attempted on each regardless
    /// of the others; safe to call more than once.
    pub fn close(&mut self) {
        for stage in &mut self.stages {
            stage.close();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}
