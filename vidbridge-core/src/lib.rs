//! # Vidbridge Core
//!
//! Core types for the vidbridge video codec adaptation layer.
//!
//! This crate provides the building blocks shared by every processing stage:
//! - Error handling types
//! - Format descriptors for raw, compressed and surface-bound video
//! - The `Buffer` unit of data exchanged between stages
//! - A reusable byte-buffer pool
//! - The stage contract (`open`/`process`/`close`) and its status flags

pub mod error;
pub mod format;
pub mod buffer;
pub mod pool;
pub mod stage;

pub use error::{Error, Result};
pub use format::{FormatDescriptor, PixelLayout, PlaneSpec, VideoEncoding};
pub use buffer::{Buffer, BufferFlags, BufferPayload, SurfaceToken};
pub use pool::{BufferPool, SharedBufferPool};
pub use stage::{ProcessStatus, SessionState, Stage};
