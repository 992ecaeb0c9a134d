//! Buffer types passed between the client and the engine.
//!
//! Every buffer has two faces:
//!
//! - [`ClientBuffer`]: the mutable handle the client fills or reads, with a
//!   byte range, metadata and a format snapshot
//! - [`EngineBuffer`]: the immutable form the engine consumes or produces
//!
//! [`ClientBuffer::as_engine_buffer`] derives the engine form over the same
//! memory. Slot tables keep a [`WeakEngineBuffer`] to it so they know when
//! the engine has let go.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotline::buffer::ClientBuffer;
//! use slotline::memory::LinearBlock;
//!
//! let buffer = ClientBuffer::linear(format, LinearBlock::heap(4096));
//! buffer.fill(b"access unit")?;
//!
//! let engine = buffer.as_engine_buffer()?.expect("linear buffers convert");
//! let weak = engine.downgrade();
//! drop(engine);
//! assert!(weak.is_expired());
//! ```

mod client;
mod engine;

pub use client::ClientBuffer;
pub use engine::{BufferData, BufferInfo, EngineBuffer, LinearView, WeakEngineBuffer};
