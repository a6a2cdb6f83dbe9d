//! Host-supplied stream settings.
//!
//! The surrounding client owns these values (its call settings screen, its
//! sensor callbacks) and hands them in at pipeline-build time; they
//! serialize so the client can persist them between calls.

use serde::{Deserialize, Serialize};

/// Device orientation relative to the sensor's natural position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Natural orientation.
    #[default]
    Rotate0,
    /// Rotated a quarter turn.
    Rotate90,
    /// Upside down.
    Rotate180,
    /// Rotated three quarter turns.
    Rotate270,
}

impl Orientation {
    /// Check whether this orientation swaps width and height.
    pub fn is_transposed(&self) -> bool {
        matches!(self, Self::Rotate90 | Self::Rotate270)
    }

    /// Apply the orientation to capture dimensions.
    pub fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        if self.is_transposed() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Stream configuration supplied by the host client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Target bitrate in bits per second.
    pub target_bitrate: u32,
    /// Nominal frames per second.
    pub frame_rate: f64,
    /// Current device orientation.
    pub orientation: Orientation,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            target_bitrate: 800_000,
            frame_rate: 30.0,
            orientation: Orientation::Rotate0,
        }
    }
}

impl StreamSettings {
    /// Set the target bitrate in bits per second.
    pub fn with_bitrate(mut self, bits_per_second: u32) -> Self {
        self.target_bitrate = bits_per_second;
        self
    }

    /// Set the frame rate.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = fps;
        self
    }

    /// Set the orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}
