//! Buffer metadata types.

use std::time::Duration;

/// Flags indicating buffer properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferFlags {
    /// Buffer marks end of stream.
    pub eos: bool,
    /// Buffer carries codec configuration (stream headers) rather than media.
    pub codec_config: bool,
    /// Buffer contains a sync point (keyframe).
    pub sync_frame: bool,
}

impl BufferFlags {
    /// No flags set.
    pub const NONE: BufferFlags = BufferFlags {
        eos: false,
        codec_config: false,
        sync_frame: false,
    };

    /// Only the end-of-stream flag.
    pub fn eos() -> Self {
        Self {
            eos: true,
            ..Self::NONE
        }
    }

    /// Only the codec-config flag.
    pub fn codec_config() -> Self {
        Self {
            codec_config: true,
            ..Self::NONE
        }
    }

    /// Returns true if no flag is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Union of two flag sets.
    pub fn union(self, other: BufferFlags) -> Self {
        Self {
            eos: self.eos || other.eos,
            codec_config: self.codec_config || other.codec_config,
            sync_frame: self.sync_frame || other.sync_frame,
        }
    }
}

/// Metadata attached to a client-facing buffer.
///
/// Input buffers must carry a presentation timestamp before they are queued;
/// output buffers get the timestamp and flags of the work item that produced
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Presentation timestamp.
    pub pts: Option<Duration>,
    /// Buffer flags.
    pub flags: BufferFlags,
}

impl Metadata {
    /// Create new metadata with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the presentation timestamp.
    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Mark as end-of-stream.
    pub fn with_eos(mut self) -> Self {
        self.flags.eos = true;
        self
    }

    /// Mark as codec configuration data.
    pub fn with_codec_config(mut self) -> Self {
        self.flags.codec_config = true;
        self
    }

    /// Reset to defaults.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
