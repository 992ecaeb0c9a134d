//! Memory management for slotline.
//!
//! # Architecture
//!
//! - [`ScratchPool`]: bounded pool recycling byte blocks of the same or larger size
//! - [`ScratchBlock`]: RAII handle that returns its memory to the pool on drop
//! - [`LinearBlock`] / [`GraphicBlock`]: shared block memory seen by both client and engine
//! - [`BlockPool`]: collaborator trait the engine implements to hand out blocks
//! - [`SecureHeap`]: fixed budget of shared regions for encrypted input
//!
//! # Example
//!
//! ```rust,ignore
//! use slotline::memory::{BasicBlockPool, BlockPool, MemoryUsage};
//!
//! let pool = BasicBlockPool::new(16 * 512 * 1024);
//! let block = pool.fetch_linear_block(512 * 1024, MemoryUsage::CPU_READ_WRITE)?;
//! block.write(0, b"hello")?;
//!
//! // Memory goes back to the pool once every handle is dropped
//! drop(block);
//! ```

mod block;
mod block_pool;
pub mod defaults;
mod scratch;
mod secure;

pub use block::{BlockWatch, GraphicBlock, LinearBlock, MemoryUsage};
pub use block_pool::{BasicBlockPool, BlockPool, BlockPoolKind};
pub use scratch::{ScratchBlock, ScratchPool};
pub use secure::{SecureHeap, SecureRegion};
