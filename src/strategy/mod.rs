//! Buffer-role strategies.
//!
//! A strategy pairs a slot table with the policy that allocates or wraps the
//! buffers of one channel direction. The set of strategies is closed:
//!
//! | Direction | Role | Buffers |
//! |-----------|------|---------|
//! | Input | [`InputRole::Linear`] | fresh linear blocks from the block pool |
//! | Input | [`InputRole::EncryptedLinear`] | linear blocks paired with a secure region |
//! | Input | [`InputRole::Graphic`] | image blocks staged in scratch memory |
//! | Input | [`InputRole::Passthrough`] | none; an input surface feeds the engine |
//! | Output | [`OutputRole::Linear`] | read-only views of engine byte buffers |
//! | Output | [`OutputRole::Graphic`] | containers forwarded to an output surface |
//! | Output | [`OutputRole::RawGraphic`] | copies of engine images in scratch memory |
//!
//! Every strategy starts with a flexible slot table and can be converted once
//! into array mode.

mod input;
mod output;

pub use input::InputBuffers;
pub use output::OutputBuffers;

use crate::format::MediaKind;
use crate::observability::Direction;

/// How input buffers are provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    /// Plain byte buffers.
    Linear,
    /// Byte buffers holding encrypted data until submission.
    EncryptedLinear {
        /// Engine reads protected memory only.
        secure: bool,
    },
    /// Raw images.
    Graphic,
    /// Buffers come from an input surface; the channel allocates nothing.
    Passthrough,
}

impl InputRole {
    /// Choose the input role for an engine.
    pub fn select(
        kind: MediaKind,
        has_input_surface: bool,
        has_decryptor: bool,
        secure: bool,
    ) -> Self {
        if kind.is_graphic() {
            if has_input_surface {
                InputRole::Passthrough
            } else {
                InputRole::Graphic
            }
        } else if has_decryptor {
            InputRole::EncryptedLinear { secure }
        } else {
            InputRole::Linear
        }
    }
}

/// How output buffers are presented to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRole {
    /// Byte buffers.
    Linear,
    /// Images rendered to an output surface.
    Graphic,
    /// Images copied out for the client to read.
    RawGraphic,
}

impl OutputRole {
    /// Choose the output role for an engine.
    pub fn select(kind: MediaKind, has_output_surface: bool) -> Self {
        match (kind.is_graphic(), has_output_surface) {
            (true, true) => OutputRole::Graphic,
            (true, false) => OutputRole::RawGraphic,
            (false, _) => OutputRole::Linear,
        }
    }
}

/// Role of one channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    /// Input side role.
    Input(InputRole),
    /// Output side role.
    Output(OutputRole),
}

impl BufferRole {
    /// Direction this role configures.
    pub fn direction(&self) -> Direction {
        match self {
            BufferRole::Input(_) => Direction::Input,
            BufferRole::Output(_) => Direction::Output,
        }
    }
}
