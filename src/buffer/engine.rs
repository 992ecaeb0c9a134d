//! Engine-facing buffers.

use crate::error::{Error, Result};
use crate::memory::{GraphicBlock, LinearBlock};
use smallvec::SmallVec;
use std::sync::{Arc, Weak};

/// A byte range inside a linear block.
#[derive(Clone, Debug)]
pub struct LinearView {
    block: LinearBlock,
    offset: usize,
    size: usize,
}

impl LinearView {
    /// Create a view of `size` bytes at `offset`.
    pub fn new(block: LinearBlock, offset: usize, size: usize) -> Result<Self> {
        if offset.checked_add(size).is_none_or(|end| end > block.capacity()) {
            return Err(Error::InvalidArgument(format!(
                "range {}+{} exceeds block of {} bytes",
                offset,
                size,
                block.capacity()
            )));
        }
        Ok(Self {
            block,
            offset,
            size,
        })
    }

    /// View covering the whole block.
    pub fn full(block: LinearBlock) -> Self {
        let size = block.capacity();
        Self {
            block,
            offset: 0,
            size,
        }
    }

    /// The underlying block.
    pub fn block(&self) -> &LinearBlock {
        &self.block
    }

    /// Start of the range.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the range.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` over the bytes of the range.
    pub fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.block
            .map(|data| f(&data[self.offset..self.offset + self.size]))
    }

    /// Copy the range out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.map(<[u8]>::to_vec)
    }
}

/// Payload of an engine buffer.
#[derive(Clone, Debug)]
pub enum BufferData {
    /// Byte ranges in linear blocks.
    Linear(SmallVec<[LinearView; 1]>),
    /// Image blocks.
    Graphic(SmallVec<[GraphicBlock; 1]>),
}

impl BufferData {
    /// Number of blocks in the payload.
    pub fn block_count(&self) -> usize {
        match self {
            BufferData::Linear(views) => views.len(),
            BufferData::Graphic(blocks) => blocks.len(),
        }
    }
}

/// Per-buffer information attached by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferInfo {
    /// The buffer starts a sync point.
    pub key_frame: bool,
}

struct EngineBufferInner {
    data: BufferData,
    info: BufferInfo,
}

/// Immutable buffer as the engine sees it.
///
/// Cloning shares the buffer. A [`WeakEngineBuffer`] observes whether any
/// clone is still alive, which is how slot tables learn that the engine is
/// done with the memory.
#[derive(Clone)]
pub struct EngineBuffer {
    inner: Arc<EngineBufferInner>,
}

impl EngineBuffer {
    /// Create a buffer from raw payload.
    pub fn new(data: BufferData) -> Self {
        Self::with_info(data, BufferInfo::default())
    }

    /// Create a buffer with engine-supplied info.
    pub fn with_info(data: BufferData, info: BufferInfo) -> Self {
        Self {
            inner: Arc::new(EngineBufferInner { data, info }),
        }
    }

    /// Create a buffer over one linear range.
    pub fn linear(view: LinearView) -> Self {
        Self::new(BufferData::Linear(smallvec::smallvec![view]))
    }

    /// Create a buffer over one image block.
    pub fn graphic(block: GraphicBlock) -> Self {
        Self::new(BufferData::Graphic(smallvec::smallvec![block]))
    }

    /// Buffer payload.
    pub fn data(&self) -> &BufferData {
        &self.inner.data
    }

    /// Engine-supplied info.
    pub fn info(&self) -> BufferInfo {
        self.inner.info
    }

    /// The single linear range, if the payload is exactly one linear block.
    pub fn single_linear(&self) -> Option<&LinearView> {
        match &self.inner.data {
            BufferData::Linear(views) if views.len() == 1 => views.first(),
            _ => None,
        }
    }

    /// The single image block, if the payload is exactly one graphic block.
    pub fn single_graphic(&self) -> Option<&GraphicBlock> {
        match &self.inner.data {
            BufferData::Graphic(blocks) if blocks.len() == 1 => blocks.first(),
            _ => None,
        }
    }

    /// Weak reference to this buffer.
    pub fn downgrade(&self) -> WeakEngineBuffer {
        WeakEngineBuffer(Arc::downgrade(&self.inner))
    }

    /// Returns true if both handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &EngineBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for EngineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuffer")
            .field("data", &self.inner.data)
            .field("info", &self.inner.info)
            .finish()
    }
}

/// Weak back-reference from a slot to the engine form of its buffer.
///
/// A default-constructed reference is already expired.
#[derive(Clone, Default)]
pub struct WeakEngineBuffer(Weak<EngineBufferInner>);

impl WeakEngineBuffer {
    /// Returns true once no [`EngineBuffer`] clone is alive.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.0.strong_count() == 0
    }

    /// Get the buffer back if it is still alive.
    pub fn upgrade(&self) -> Option<EngineBuffer> {
        self.0.upgrade().map(|inner| EngineBuffer { inner })
    }
}

impl std::fmt::Debug for WeakEngineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakEngineBuffer")
            .field("expired", &self.is_expired())
            .finish()
    }
}
