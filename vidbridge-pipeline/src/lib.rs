//! # Vidbridge Pipeline
//!
//! Builds and drives the video processing graph.
//!
//! At build time the [`PipelineBuilder`] negotiates the input format
//! against the hardware codec service first, falls back to the software
//! compressor, and otherwise reports a negotiation failure so the
//! surrounding session can continue without this layer. The chosen backend
//! is fixed in a [`VideoStage`] tagged variant; a single driver thread then
//! feeds frames through [`Pipeline::process_frame`].

pub mod error;
pub mod settings;
pub mod passthrough;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use settings::{Orientation, StreamSettings};
pub use passthrough::SurfacePassthrough;
pub use pipeline::{BackendKind, Drive, Pipeline, PipelineBuilder, VideoStage};
