//! # Vidbridge HW
//!
//! Adapter over the platform's hardware-accelerated codec service.
//!
//! The service itself lives outside this layer and is specified only at its
//! interface: a [`CodecService`] opens non-blocking [`CodecHandle`] sessions
//! and reports a capability catalog. [`HwVideoStage`] wraps one such session
//! behind the common stage contract, owning the exhaust-then-feed buffer
//! loop, partial input consumption, and the reconfigure-without-leaks rule.

pub mod error;
pub mod service;
pub mod adapter;

pub use error::{HwError, Result};
pub use service::{CodecHandle, CodecService, InputSlot, OutputUnit, SessionRequest};
pub use adapter::HwVideoStage;
