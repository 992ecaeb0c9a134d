//! Stream format descriptions attached to client-facing buffers.
//!
//! A [`MediaFormat`] is installed per direction when the channel is
//! configured. Every client buffer handed out carries a shared snapshot of
//! the format in effect at that moment, so a header update (new `csd-0`)
//! never mutates a format a client is still looking at.

use bytes::Bytes;
use std::sync::Arc;

// ============================================================================
// Media kind
// ============================================================================

/// Coarse kind of a stream, as reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MediaKind {
    /// Audio or any other byte-oriented stream.
    #[default]
    Audio,
    /// Video; raw frames use graphic buffers.
    Video,
}

impl MediaKind {
    /// Returns true if raw buffers of this kind are graphic.
    #[inline]
    pub fn is_graphic(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

// ============================================================================
// Pixel formats
// ============================================================================

/// Pixel formats for graphic blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// YUV 4:2:0 planar, Y then V then U.
    #[default]
    Yv12,
    /// YUV 4:2:0 planar, Y then U then V.
    I420,
    /// YUV 4:2:0 semi-planar.
    Nv12,
    /// 32-bit RGBA.
    Rgba,
}

impl PixelFormat {
    /// Bytes needed for one frame of `width` x `height`.
    pub const fn frame_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Yv12 | PixelFormat::I420 | PixelFormat::Nv12 => pixels * 3 / 2,
            PixelFormat::Rgba => pixels * 4,
        }
    }
}

// ============================================================================
// Codec data
// ============================================================================

/// Codec initialization data (stream headers such as SPS/PPS).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecData(Bytes);

impl CodecData {
    /// Create new codec data from bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Get the data as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Get the underlying shared bytes.
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Get the length of the codec data.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CodecData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// Media format
// ============================================================================

/// Format of the buffers flowing through one direction of a channel.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MediaFormat {
    /// MIME type, e.g. `video/avc` or `audio/raw`.
    pub mime: String,
    /// Stream kind.
    pub kind: MediaKind,
    /// Frame width for video.
    pub width: Option<u32>,
    /// Frame height for video.
    pub height: Option<u32>,
    /// Largest input buffer the engine accepts, overriding the default size.
    pub max_input_size: Option<usize>,
    /// Codec-specific data, indexed as `csd-0`, `csd-1`, ...
    pub csd: Vec<CodecData>,
}

impl MediaFormat {
    /// Create an audio (linear) format.
    pub fn audio(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            kind: MediaKind::Audio,
            ..Default::default()
        }
    }

    /// Create a video format with a resolution.
    pub fn video(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            mime: mime.into(),
            kind: MediaKind::Video,
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    /// Set the maximum input buffer size.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = Some(size);
        self
    }

    /// Width and height, if both are present.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    /// Get `csd-<index>` if present.
    pub fn csd(&self, index: usize) -> Option<&CodecData> {
        self.csd.get(index)
    }

    /// Return a copy of this format with `csd-<index>` replaced.
    ///
    /// Missing lower indices are filled with empty data.
    pub fn with_csd(&self, index: usize, data: CodecData) -> Arc<MediaFormat> {
        let mut format = self.clone();
        if format.csd.len() <= index {
            format.csd.resize(index + 1, CodecData::new(Bytes::new()));
        }
        format.csd[index] = data;
        Arc::new(format)
    }
}
