//! Video format descriptors.
//!
//! A [`FormatDescriptor`] names what a buffer holds: the encoding, optional
//! dimensions and frame rate, and for raw video the pixel layout and
//! per-plane geometry. Descriptors are immutable value types; stages compare
//! them with [`FormatDescriptor::is_compatible`] during negotiation and
//! reconfiguration.

use std::fmt;

/// Video encoding carried by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VideoEncoding {
    /// H.264 / AVC.
    H264,
    /// VP8.
    Vp8,
    /// VP9.
    Vp9,
    /// Uncompressed planar YUV video.
    RawYuv,
    /// No data path: frames are rendered directly into a display surface.
    OpaqueSurface,
}

impl VideoEncoding {
    /// Get the MIME type for this encoding.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::H264 => "video/avc",
            Self::Vp8 => "video/x-vnd.on2.vp8",
            Self::Vp9 => "video/x-vnd.on2.vp9",
            Self::RawYuv => "video/raw",
            Self::OpaqueSurface => "video/surface",
        }
    }

    /// Check if this encoding carries compressed bitstream data.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::H264 | Self::Vp8 | Self::Vp9)
    }
}

impl fmt::Display for VideoEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "H.264/AVC"),
            Self::Vp8 => write!(f, "VP8"),
            Self::Vp9 => write!(f, "VP9"),
            Self::RawYuv => write!(f, "raw YUV"),
            Self::OpaqueSurface => write!(f, "opaque surface"),
        }
    }
}

/// Pixel layout of a raw video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelLayout {
    /// Planar YUV 4:2:0 (Y, U, V planes).
    I420,
    /// Y plane plus interleaved UV plane.
    Nv12,
    /// Y plane plus interleaved VU plane.
    Nv21,
    /// Packed RGBA, 32bpp.
    Rgba,
}

impl PixelLayout {
    /// Get the number of planes for this layout.
    pub fn plane_count(&self) -> usize {
        match self {
            Self::I420 => 3,
            Self::Nv12 | Self::Nv21 => 2,
            Self::Rgba => 1,
        }
    }

    /// Total byte size of one frame at the given dimensions.
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            // 4:2:0 subsampling: full-res luma plus two quarter-res chroma planes.
            Self::I420 | Self::Nv12 | Self::Nv21 => pixels + pixels / 2,
            Self::Rgba => pixels * 4,
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I420 => write!(f, "i420"),
            Self::Nv12 => write!(f, "nv12"),
            Self::Nv21 => write!(f, "nv21"),
            Self::Rgba => write!(f, "rgba"),
        }
    }
}

/// Stride and offset of one plane within a raw frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneSpec {
    /// Bytes per row.
    pub stride: usize,
    /// Byte offset of the plane within the payload.
    pub offset: usize,
}

/// Immutable description of a video format.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    /// The encoding.
    pub encoding: VideoEncoding,
    /// Frame width in pixels, when known.
    pub width: Option<u32>,
    /// Frame height in pixels, when known.
    pub height: Option<u32>,
    /// Frames per second, when known.
    pub frame_rate: Option<f64>,
    /// Pixel layout, for raw video.
    pub layout: Option<PixelLayout>,
    /// Per-plane geometry, when the producer specifies it.
    pub planes: Vec<PlaneSpec>,
}

impl FormatDescriptor {
    /// Create a descriptor with only the encoding set.
    pub fn new(encoding: VideoEncoding) -> Self {
        Self {
            encoding,
            width: None,
            height: None,
            frame_rate: None,
            layout: None,
            planes: Vec::new(),
        }
    }

    /// Create a raw-video descriptor with a pixel layout.
    pub fn raw(layout: PixelLayout) -> Self {
        Self::new(VideoEncoding::RawYuv).with_layout(layout)
    }

    /// Create the opaque-surface descriptor used by the zero-copy path.
    pub fn opaque_surface() -> Self {
        Self::new(VideoEncoding::OpaqueSurface)
    }

    /// Set the dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the frame rate.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    /// Set the pixel layout.
    pub fn with_layout(mut self, layout: PixelLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set per-plane geometry.
    pub fn with_planes(mut self, planes: Vec<PlaneSpec>) -> Self {
        self.planes = planes;
        self
    }

    /// Get dimensions, when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    /// Byte size of one raw frame in this format, when computable.
    pub fn frame_size(&self) -> Option<usize> {
        let (w, h) = self.dimensions()?;
        Some(self.layout?.frame_size(w, h))
    }

    /// Check compatibility with another descriptor.
    ///
    /// Two descriptors are compatible when the encodings match and every
    /// attribute specified on both sides agrees. An attribute left
    /// unspecified on either side does not constrain the match.
    pub fn is_compatible(&self, other: &FormatDescriptor) -> bool {
        if self.encoding != other.encoding {
            return false;
        }
        if let (Some(a), Some(b)) = (self.width, other.width) {
            if a != b {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (self.height, other.height) {
            if a != b {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (self.layout, other.layout) {
            if a != b {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoding)?;
        if let Some((w, h)) = self.dimensions() {
            write!(f, " {}x{}", w, h)?;
        }
        if let Some(layout) = self.layout {
            write!(f, " ({})", layout)?;
        }
        Ok(())
    }
}
