//! Work items exchanged with the engine.
//!
//! A [`Work`] carries one input frame to the engine and comes back with one
//! [`Worklet`] describing the output.

use crate::buffer::EngineBuffer;
use crate::metadata::BufferFlags;
use bytes::Bytes;
use std::time::Duration;

/// Outcome of a work item reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkResult {
    /// Processed normally.
    #[default]
    Ok,
    /// Discarded by an engine flush.
    NotFound,
    /// Failed with an engine status code.
    Failed(i32),
}

/// Parameter change reported with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    /// Codec-specific data (stream headers) for the output.
    Csd(Bytes),
    /// Any other parameter, passed through untouched.
    Param {
        /// Parameter name.
        name: String,
        /// Encoded value.
        value: Bytes,
    },
}

/// One frame of input or output.
#[derive(Debug, Clone, Default)]
pub struct FrameData {
    /// Frame flags.
    pub flags: BufferFlags,
    /// Presentation timestamp.
    pub timestamp: Duration,
    /// Submission order; output frames echo the index of their input.
    pub frame_index: u64,
    /// Buffers of the frame. At most one is expected.
    pub buffers: Vec<EngineBuffer>,
    /// Parameter changes that came with the frame.
    pub config_update: Vec<ConfigUpdate>,
}

impl FrameData {
    /// Codec-specific data carried by the frame, if any.
    ///
    /// The last update wins when several are present.
    pub fn csd(&self) -> Option<&Bytes> {
        self.config_update.iter().rev().find_map(|update| match update {
            ConfigUpdate::Csd(data) => Some(data),
            ConfigUpdate::Param { .. } => None,
        })
    }
}

/// Output produced for a work item.
#[derive(Debug, Clone, Default)]
pub struct Worklet {
    /// Output frame.
    pub output: FrameData,
}

/// A unit of engine work.
#[derive(Debug, Clone, Default)]
pub struct Work {
    /// Input frame submitted by the channel.
    pub input: FrameData,
    /// Processing steps; the channel submits exactly one.
    pub worklets: Vec<Worklet>,
    /// Completion status set by the engine.
    pub result: WorkResult,
}

impl Work {
    /// Work item for `input` with one empty worklet.
    pub fn new(input: FrameData) -> Self {
        Self {
            input,
            worklets: vec![Worklet::default()],
            result: WorkResult::Ok,
        }
    }

    /// Frame index of the input.
    pub fn frame_index(&self) -> u64 {
        self.input.frame_index
    }
}
