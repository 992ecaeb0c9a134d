//! Block allocation collaborator.
//!
//! The channel never allocates hardware buffers itself. It asks a
//! [`BlockPool`] supplied by the engine for linear or graphic blocks of a
//! given size and usage. [`BasicBlockPool`] is a ready-made implementation
//! backed by a bounded [`ScratchPool`], useful for software engines and tests.
//!
//! # Example
//!
//! ```rust
//! use slotline::memory::{BasicBlockPool, BlockPool, MemoryUsage};
//!
//! let pool = BasicBlockPool::new(2 * 4096);
//! let a = pool.fetch_linear_block(4096, MemoryUsage::CPU_READ_WRITE).unwrap();
//! let b = pool.fetch_linear_block(4096, MemoryUsage::CPU_READ_WRITE).unwrap();
//!
//! // Both blocks are held: the third request is backpressure.
//! assert!(pool.fetch_linear_block(4096, MemoryUsage::CPU_READ_WRITE).is_err());
//! drop((a, b));
//! ```

use super::{GraphicBlock, LinearBlock, MemoryUsage, ScratchPool};
use crate::error::{Error, Result};
use crate::format::PixelFormat;
use std::sync::Arc;

/// Kind of block a pool hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockPoolKind {
    /// Contiguous byte blocks.
    Linear,
    /// 2D image blocks.
    Graphic,
}

/// Source of blocks for channel buffers.
///
/// Implementations return [`Error::PoolExhausted`] when no block can be
/// handed out right now; the channel treats that as backpressure.
pub trait BlockPool: Send + Sync {
    /// Fetch a linear block of at least `capacity` bytes.
    fn fetch_linear_block(&self, capacity: usize, usage: MemoryUsage) -> Result<LinearBlock>;

    /// Fetch a graphic block of the given geometry.
    fn fetch_graphic_block(
        &self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicBlock>;
}

/// Block pool backed by a bounded scratch pool.
#[derive(Debug, Clone)]
pub struct BasicBlockPool {
    memory: Arc<ScratchPool>,
}

impl BasicBlockPool {
    /// Create a pool that never holds more than `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: ScratchPool::with_name("slotline-blocks", capacity),
        }
    }

    /// Create a pool on top of an existing scratch pool.
    pub fn from_scratch(memory: Arc<ScratchPool>) -> Self {
        Self { memory }
    }

    /// The scratch pool behind this block pool.
    pub fn memory(&self) -> &Arc<ScratchPool> {
        &self.memory
    }
}

impl BlockPool for BasicBlockPool {
    fn fetch_linear_block(&self, capacity: usize, usage: MemoryUsage) -> Result<LinearBlock> {
        let data = self.memory.acquire(capacity).ok_or(Error::PoolExhausted)?;
        Ok(LinearBlock::new(data, usage))
    }

    fn fetch_graphic_block(
        &self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicBlock> {
        let size = pixel_format.frame_size(width, height);
        let data = self.memory.acquire(size).ok_or(Error::PoolExhausted)?;
        GraphicBlock::new(data, width, height, pixel_format, usage)
    }
}
