//! # Slotline
//!
//! Buffer-slot lifecycle management for streaming codec pipelines.
//!
//! Slotline sits between a codec *engine*, which fills and drains buffers
//! asynchronously, and a *client* that reads or writes them. It hands out
//! a bounded set of reusable buffers, tracks who owns each one, and makes
//! sure a slot is only reused once neither side still references it.
//!
//! ## Features
//!
//! - **Ownership handoff**: client and engine views of a buffer share memory;
//!   a slot frees itself when the last engine reference is dropped
//! - **Flexible and array tables**: grow slots on demand, or switch once to
//!   a fixed, pre-enumerated array without breaking in-flight buffers
//! - **Stop-safe submission**: an admission gate guarantees no submission
//!   straddles a `stop()`, and stale completions are filtered by generation
//! - **Pooled scratch memory**: graphic staging reuses blocks under a byte
//!   budget
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use slotline::prelude::*;
//!
//! let (events, receiver) = EventQueue::unbounded();
//! let channel = BufferChannel::new(engine, Arc::new(events), ChannelConfig::default());
//! channel.start(Some(MediaFormat::audio("audio/mp4a-latm")), Some(MediaFormat::audio("audio/raw")))?;
//!
//! if let Some(ChannelEvent::InputAvailable { buffer, .. }) = receiver.recv() {
//!     buffer.fill(&access_unit)?;
//!     buffer.set_metadata(Metadata::new().with_pts(pts));
//!     channel.queue_input_buffer(&buffer)?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod buffer;
pub mod channel;
pub mod error;
pub mod format;
pub mod memory;
pub mod metadata;
pub mod observability;
pub mod slots;
pub mod strategy;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{ClientBuffer, EngineBuffer};
    pub use crate::channel::{
        BufferChannel, ChannelCallback, ChannelConfig, ChannelEvent, Engine, ErrorAction,
        EventQueue, Work,
    };
    pub use crate::error::{Error, Result};
    pub use crate::format::{MediaFormat, MediaKind};
    pub use crate::memory::{BlockPool, ScratchPool};
    pub use crate::metadata::{BufferFlags, Metadata};
}

pub use error::{Error, Result};
