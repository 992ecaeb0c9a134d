//! Linear and graphic blocks shared between client and engine views.
//!
//! A block is the unit of backing memory. Client-facing buffers write into a
//! block; the engine-facing buffer derived from it reads the same block. Both
//! sides hold an `Arc` to the block memory, so the memory stays alive until
//! the last view is gone.

use super::ScratchBlock;
use crate::error::{Error, Result};
use crate::format::PixelFormat;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// How a block may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryUsage {
    /// CPU may read the block.
    pub cpu_read: bool,
    /// CPU may write the block.
    pub cpu_write: bool,
    /// Block lives in protected memory only the engine can read.
    pub protected: bool,
}

impl MemoryUsage {
    /// Ordinary CPU-accessible memory.
    pub const CPU_READ_WRITE: MemoryUsage = MemoryUsage {
        cpu_read: true,
        cpu_write: true,
        protected: false,
    };

    /// Protected memory for secure decoders.
    pub const READ_PROTECTED: MemoryUsage = MemoryUsage {
        cpu_read: false,
        cpu_write: false,
        protected: true,
    };
}

impl Default for MemoryUsage {
    fn default() -> Self {
        Self::CPU_READ_WRITE
    }
}

/// Backing memory of a block.
pub(crate) struct BlockMemory {
    data: Mutex<ScratchBlock>,
    usage: MemoryUsage,
}

impl BlockMemory {
    fn new(data: ScratchBlock, usage: MemoryUsage) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            usage,
        })
    }

    fn capacity(&self) -> usize {
        self.data.lock().capacity()
    }

    fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        if !self.usage.cpu_write {
            return Err(Error::InvalidArgument(
                "block is not CPU writable".to_string(),
            ));
        }
        let mut data = self.data.lock();
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= data.capacity())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "write of {} bytes at {} exceeds block of {} bytes",
                    bytes.len(),
                    offset,
                    data.capacity()
                ))
            })?;
        data.as_mut_slice()[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.data.lock().as_slice())
    }

    fn map_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(self.data.lock().as_mut_slice())
    }
}

// ============================================================================
// LinearBlock
// ============================================================================

/// A contiguous byte block.
///
/// Cloning is cheap and shares the memory.
#[derive(Clone)]
pub struct LinearBlock {
    memory: Arc<BlockMemory>,
}

impl LinearBlock {
    /// Wrap a scratch block as a linear block.
    pub fn new(data: ScratchBlock, usage: MemoryUsage) -> Self {
        Self {
            memory: BlockMemory::new(data, usage),
        }
    }

    /// Allocate an unpooled heap block.
    pub fn heap(capacity: usize) -> Self {
        Self::new(ScratchBlock::unpooled(capacity), MemoryUsage::CPU_READ_WRITE)
    }

    /// Create a block holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = ScratchBlock::unpooled(bytes.len());
        data.as_mut_slice().copy_from_slice(bytes);
        Self::new(data, MemoryUsage::CPU_READ_WRITE)
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Access flags of the block.
    pub fn usage(&self) -> MemoryUsage {
        self.memory.usage
    }

    /// Copy `bytes` into the block at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.memory.write(offset, bytes)
    }

    /// Run `f` over the whole block.
    pub fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.memory.map(f)
    }

    /// Run `f` over the whole block mutably.
    pub fn map_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.memory.map_mut(f)
    }

    /// Returns true if both handles share the same memory.
    pub fn ptr_eq(&self, other: &LinearBlock) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }

    /// Weak link used to find out when every view of the block is gone.
    pub fn downgrade(&self) -> BlockWatch {
        BlockWatch(Arc::downgrade(&self.memory))
    }
}

impl std::fmt::Debug for LinearBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearBlock")
            .field("capacity", &self.capacity())
            .field("usage", &self.memory.usage)
            .finish()
    }
}

// ============================================================================
// GraphicBlock
// ============================================================================

/// A 2D image block.
#[derive(Clone)]
pub struct GraphicBlock {
    memory: Arc<BlockMemory>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl GraphicBlock {
    /// Wrap a scratch block as an image of the given geometry.
    ///
    /// The scratch block must hold at least one full frame.
    pub fn new(
        data: ScratchBlock,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<Self> {
        let needed = pixel_format.frame_size(width, height);
        if data.capacity() < needed {
            return Err(Error::AllocationFailed(format!(
                "graphic block of {} bytes cannot hold {}x{} {:?}",
                data.capacity(),
                width,
                height,
                pixel_format
            )));
        }
        Ok(Self {
            memory: BlockMemory::new(data, usage),
            width,
            height,
            pixel_format,
        })
    }

    /// Allocate an unpooled heap image.
    pub fn heap(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let data = ScratchBlock::unpooled(pixel_format.frame_size(width, height));
        Self {
            memory: BlockMemory::new(data, MemoryUsage::CPU_READ_WRITE),
            width,
            height,
            pixel_format,
        }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Bytes of one frame of this image.
    pub fn frame_size(&self) -> usize {
        self.pixel_format.frame_size(self.width, self.height)
    }

    /// Access flags of the block.
    pub fn usage(&self) -> MemoryUsage {
        self.memory.usage
    }

    /// Copy `bytes` into the image memory at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.memory.write(offset, bytes)
    }

    /// Run `f` over the frame bytes.
    pub fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let size = self.frame_size();
        self.memory.map(|data| f(&data[..size]))
    }

    /// Returns true if both handles share the same memory.
    pub fn ptr_eq(&self, other: &GraphicBlock) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }
}

impl std::fmt::Debug for GraphicBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicBlock")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .finish()
    }
}

/// Observes whether any handle to a block is still alive.
#[derive(Clone, Default)]
pub struct BlockWatch(Weak<BlockMemory>);

impl BlockWatch {
    /// Returns true once every handle to the block has been dropped.
    pub fn is_expired(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl std::fmt::Debug for BlockWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BlockWatch").field(&self.is_expired()).finish()
    }
}
