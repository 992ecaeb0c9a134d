//! Client-facing buffers.

use super::{EngineBuffer, LinearView};
use crate::error::{Error, Result};
use crate::format::MediaFormat;
use crate::memory::{GraphicBlock, LinearBlock, ScratchBlock, ScratchPool, SecureRegion};
use crate::metadata::Metadata;
use parking_lot::Mutex;
use std::sync::Arc;

/// Memory a client buffer exposes.
enum Backing {
    /// Writable linear block.
    Linear(LinearBlock),
    /// Linear block filled by decrypting a secure region.
    EncryptedLinear {
        block: LinearBlock,
        region: SecureRegion,
    },
    /// Image block; the client writes into staging memory.
    Graphic {
        block: GraphicBlock,
        staging: ScratchBlock,
    },
    /// Read-only wrapper of an engine linear buffer.
    ConstLinear(Option<EngineBuffer>),
    /// Read-only copy of an engine image in scratch memory.
    ConstGraphic {
        source: Option<EngineBuffer>,
        staging: Option<ScratchBlock>,
        pool: Arc<ScratchPool>,
    },
    /// Plain heap bytes.
    Local(Vec<u8>),
    /// No bytes; only carries an engine buffer along.
    Container(Option<EngineBuffer>),
}

impl Backing {
    fn capacity(&self) -> usize {
        match self {
            Backing::Linear(block) => block.capacity(),
            Backing::EncryptedLinear { block, region } => block.capacity().min(region.capacity()),
            Backing::Graphic { block, .. } => block.frame_size(),
            Backing::ConstLinear(buffer) => buffer
                .as_ref()
                .and_then(EngineBuffer::single_linear)
                .map_or(0, LinearView::size),
            Backing::ConstGraphic {
                source, staging, ..
            } => match source.as_ref().and_then(EngineBuffer::single_graphic) {
                Some(block) => block.frame_size(),
                None => staging.as_ref().map_or(0, ScratchBlock::capacity),
            },
            Backing::Local(bytes) => bytes.len(),
            Backing::Container(_) => 0,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Backing::Linear(_) => "linear",
            Backing::EncryptedLinear { .. } => "encrypted-linear",
            Backing::Graphic { .. } => "graphic",
            Backing::ConstLinear(_) => "const-linear",
            Backing::ConstGraphic { .. } => "const-graphic",
            Backing::Local(_) => "local",
            Backing::Container(_) => "container",
        }
    }
}

struct ClientState {
    backing: Backing,
    offset: usize,
    size: usize,
    meta: Metadata,
    format: Arc<MediaFormat>,
}

impl ClientState {
    fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let range = self.offset..self.offset + self.size;
        match &self.backing {
            Backing::Linear(block) => block.map(|data| f(&data[range])),
            Backing::EncryptedLinear { region, .. } => region.map(|data| f(&data[range])),
            Backing::Graphic { staging, .. } => f(&staging.as_slice()[range]),
            Backing::ConstLinear(buffer) => match buffer.as_ref().and_then(EngineBuffer::single_linear) {
                Some(view) => view.map(|data| f(&data[range])),
                None => f(&[]),
            },
            Backing::ConstGraphic { staging, .. } => match staging {
                Some(staging) => f(&staging.as_slice()[range]),
                None => f(&[]),
            },
            Backing::Local(bytes) => f(&bytes[range]),
            Backing::Container(_) => f(&[]),
        }
    }
}

/// Buffer handed to the client.
///
/// Cloning yields another handle to the same buffer; slot tables compare
/// buffers by identity with [`ClientBuffer::ptr_eq`]. The readable and
/// writable window is `offset..offset + size` within `capacity`.
#[derive(Clone)]
pub struct ClientBuffer {
    inner: Arc<Mutex<ClientState>>,
}

impl ClientBuffer {
    fn from_backing(format: Arc<MediaFormat>, backing: Backing) -> Self {
        let size = backing.capacity();
        Self {
            inner: Arc::new(Mutex::new(ClientState {
                backing,
                offset: 0,
                size,
                meta: Metadata::default(),
                format,
            })),
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Writable buffer over a linear block.
    pub fn linear(format: Arc<MediaFormat>, block: LinearBlock) -> Self {
        Self::from_backing(format, Backing::Linear(block))
    }

    /// Buffer whose client-visible memory is a secure region; its contents
    /// are decrypted into `block` before submission.
    pub fn encrypted(format: Arc<MediaFormat>, block: LinearBlock, region: SecureRegion) -> Self {
        Self::from_backing(format, Backing::EncryptedLinear { block, region })
    }

    /// Writable image buffer staged in scratch memory.
    ///
    /// Fails if `staging` cannot hold one frame of `block`.
    pub fn graphic(
        format: Arc<MediaFormat>,
        block: GraphicBlock,
        staging: ScratchBlock,
    ) -> Result<Self> {
        if staging.capacity() < block.frame_size() {
            return Err(Error::AllocationFailed(format!(
                "staging of {} bytes cannot hold a {} byte frame",
                staging.capacity(),
                block.frame_size()
            )));
        }
        Ok(Self::from_backing(format, Backing::Graphic { block, staging }))
    }

    /// Read-only view of an engine buffer holding exactly one linear block.
    pub fn const_linear(format: Arc<MediaFormat>, buffer: EngineBuffer) -> Result<Self> {
        if buffer.single_linear().is_none() {
            return Err(Error::ProtocolViolation(format!(
                "expected one linear block, got {:?}",
                buffer.data()
            )));
        }
        Ok(Self::from_backing(format, Backing::ConstLinear(Some(buffer))))
    }

    /// Read-only copy of an engine image, staged in memory from `pool`.
    ///
    /// Returns [`Error::PoolExhausted`] if the pool has no room right now.
    pub fn const_graphic(
        format: Arc<MediaFormat>,
        buffer: EngineBuffer,
        pool: &Arc<ScratchPool>,
    ) -> Result<Self> {
        let this = Self::from_backing(
            format,
            Backing::ConstGraphic {
                source: None,
                staging: None,
                pool: Arc::clone(pool),
            },
        );
        this.copy_from(Some(&buffer))?;
        Ok(this)
    }

    /// Empty image copy target whose staging memory comes from `pool` on
    /// first use.
    pub fn empty_graphic(format: Arc<MediaFormat>, pool: Arc<ScratchPool>) -> Self {
        Self::from_backing(
            format,
            Backing::ConstGraphic {
                source: None,
                staging: None,
                pool,
            },
        )
    }

    /// Buffer over plain heap bytes.
    pub fn local(format: Arc<MediaFormat>, bytes: Vec<u8>) -> Self {
        Self::from_backing(format, Backing::Local(bytes))
    }

    /// Byte-less buffer carrying an optional engine buffer.
    pub fn container(format: Arc<MediaFormat>, buffer: Option<EngineBuffer>) -> Self {
        Self::from_backing(format, Backing::Container(buffer))
    }

    // ========================================================================
    // Client API
    // ========================================================================

    /// Returns true if both handles refer to the same buffer.
    #[inline]
    pub fn ptr_eq(&self, other: &ClientBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Start of the valid range.
    pub fn offset(&self) -> usize {
        self.inner.lock().offset
    }

    /// Length of the valid range.
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Bytes the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.inner.lock().backing.capacity()
    }

    /// Set the valid range.
    pub fn set_range(&self, offset: usize, size: usize) -> Result<()> {
        let mut state = self.inner.lock();
        let capacity = state.backing.capacity();
        if offset.checked_add(size).is_none_or(|end| end > capacity) {
            return Err(Error::InvalidArgument(format!(
                "range {}+{} exceeds capacity {}",
                offset, size, capacity
            )));
        }
        state.offset = offset;
        state.size = size;
        Ok(())
    }

    /// Copy of the buffer metadata.
    pub fn metadata(&self) -> Metadata {
        self.inner.lock().meta.clone()
    }

    /// Replace the buffer metadata.
    pub fn set_metadata(&self, meta: Metadata) {
        self.inner.lock().meta = meta;
    }

    /// Format snapshot in effect when the buffer was handed out.
    pub fn format(&self) -> Arc<MediaFormat> {
        Arc::clone(&self.inner.lock().format)
    }

    /// Run `f` over the bytes of the valid range.
    pub fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.inner.lock().map(f)
    }

    /// Copy the valid range out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.map(<[u8]>::to_vec)
    }

    /// Write `bytes` at `offset` of the buffer memory.
    ///
    /// Read-only buffers reject writes.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut state = self.inner.lock();
        let capacity = state.backing.capacity();
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= capacity)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "write of {} bytes at {} exceeds capacity {}",
                    bytes.len(),
                    offset,
                    capacity
                ))
            })?;
        match &mut state.backing {
            Backing::Linear(block) => block.write(offset, bytes),
            Backing::EncryptedLinear { region, .. } => region.write(offset, bytes),
            Backing::Graphic { staging, .. } => {
                staging.as_mut_slice()[offset..end].copy_from_slice(bytes);
                Ok(())
            }
            Backing::Local(local) => {
                local[offset..end].copy_from_slice(bytes);
                Ok(())
            }
            other => Err(Error::InvalidArgument(format!(
                "{} buffer is read-only",
                other.kind()
            ))),
        }
    }

    /// Write `bytes` at the start of the buffer and make them the valid range.
    pub fn fill(&self, bytes: &[u8]) -> Result<()> {
        self.write(0, bytes)?;
        self.set_range(0, bytes.len())
    }

    /// Engine form of this buffer, sharing its backing memory.
    ///
    /// Image buffers copy their staging memory into the block first, and
    /// fail if that copy fails. Heap and empty buffers have no engine form.
    pub fn as_engine_buffer(&self) -> Result<Option<EngineBuffer>> {
        let state = self.inner.lock();
        match &state.backing {
            Backing::Linear(block) | Backing::EncryptedLinear { block, .. } => {
                let view = LinearView::new(block.clone(), state.offset, state.size)?;
                Ok(Some(EngineBuffer::linear(view)))
            }
            Backing::Graphic { block, staging } => {
                let frame = block.frame_size();
                block.write(0, &staging.as_slice()[..frame])?;
                Ok(Some(EngineBuffer::graphic(block.clone())))
            }
            Backing::ConstLinear(buffer)
            | Backing::ConstGraphic { source: buffer, .. }
            | Backing::Container(buffer) => Ok(buffer.clone()),
            Backing::Local(_) => Ok(None),
        }
    }

    /// Returns true if the buffer exposes writable bytes.
    pub fn has_bytes(&self) -> bool {
        matches!(
            self.inner.lock().backing,
            Backing::Linear(_)
                | Backing::EncryptedLinear { .. }
                | Backing::Graphic { .. }
                | Backing::Local(_)
        )
    }

    /// Block and secure region of an encrypted buffer.
    pub fn encrypted_parts(&self) -> Option<(LinearBlock, SecureRegion)> {
        match &self.inner.lock().backing {
            Backing::EncryptedLinear { block, region } => Some((block.clone(), region.clone())),
            _ => None,
        }
    }

    // ========================================================================
    // Copy targets (array-mode output)
    // ========================================================================

    /// Returns true if [`copy_from`](Self::copy_from) would accept `buffer`.
    ///
    /// An empty image target acquires its staging memory here.
    pub fn can_copy(&self, buffer: Option<&EngineBuffer>) -> bool {
        let mut state = self.inner.lock();
        match &mut state.backing {
            Backing::Local(bytes) => match buffer {
                None => true,
                Some(buffer) => buffer
                    .single_linear()
                    .is_some_and(|view| view.size() <= bytes.len()),
            },
            Backing::Container(held) => held.is_none(),
            Backing::ConstGraphic {
                source,
                staging,
                pool,
            } => {
                if source.is_some() {
                    return false;
                }
                let Some(buffer) = buffer else {
                    return true;
                };
                let Some(block) = buffer.single_graphic() else {
                    return false;
                };
                ensure_staging(staging, pool, block.frame_size())
            }
            _ => false,
        }
    }

    /// Copy `buffer` into this buffer and make its contents the valid range.
    pub fn copy_from(&self, buffer: Option<&EngineBuffer>) -> Result<()> {
        let mut state = self.inner.lock();
        let size = match &mut state.backing {
            Backing::Local(bytes) => match buffer {
                None => 0,
                Some(buffer) => {
                    let view = buffer.single_linear().ok_or_else(|| {
                        Error::ProtocolViolation("expected one linear block".into())
                    })?;
                    if view.size() > bytes.len() {
                        return Err(Error::InvalidArgument(format!(
                            "{} bytes do not fit local buffer of {}",
                            view.size(),
                            bytes.len()
                        )));
                    }
                    view.map(|data| bytes[..data.len()].copy_from_slice(data));
                    view.size()
                }
            },
            Backing::Container(held) => {
                *held = buffer.cloned();
                0
            }
            Backing::ConstGraphic {
                source,
                staging,
                pool,
            } => match buffer {
                None => {
                    *source = None;
                    0
                }
                Some(buffer) => {
                    let block = buffer.single_graphic().ok_or_else(|| {
                        Error::ProtocolViolation("expected one graphic block".into())
                    })?;
                    let frame = block.frame_size();
                    if !ensure_staging(staging, pool, frame) {
                        return Err(Error::PoolExhausted);
                    }
                    if let Some(staging) = staging.as_mut() {
                        block.map(|data| staging.as_mut_slice()[..frame].copy_from_slice(data));
                    }
                    *source = Some(buffer.clone());
                    frame
                }
            },
            other => {
                return Err(Error::InvalidArgument(format!(
                    "{} buffer cannot be a copy target",
                    other.kind()
                )));
            }
        };
        state.offset = 0;
        state.size = size;
        Ok(())
    }

    // ========================================================================
    // Slot-table hooks
    // ========================================================================

    /// Engine form for a buffer the client hands back.
    ///
    /// Read-only wrappers let go of the engine buffer they hold, so the
    /// returned buffer is the only thing keeping it alive.
    pub(crate) fn take_engine_buffer(&self) -> Result<Option<EngineBuffer>> {
        let engine = self.as_engine_buffer()?;
        let mut state = self.inner.lock();
        match &mut state.backing {
            Backing::ConstLinear(buffer)
            | Backing::ConstGraphic { source: buffer, .. }
            | Backing::Container(buffer) => *buffer = None,
            _ => {}
        }
        Ok(engine)
    }

    /// Reset range and metadata before handing the buffer out again.
    pub(crate) fn reset(&self) {
        let mut state = self.inner.lock();
        state.offset = 0;
        state.size = state.backing.capacity();
        state.meta.clear();
    }

    pub(crate) fn set_format(&self, format: Arc<MediaFormat>) {
        self.inner.lock().format = format;
    }
}

fn ensure_staging(
    staging: &mut Option<ScratchBlock>,
    pool: &Arc<ScratchPool>,
    size: usize,
) -> bool {
    if staging.as_ref().is_some_and(|block| block.capacity() >= size) {
        return true;
    }
    *staging = None;
    match pool.acquire(size) {
        Some(block) => {
            *staging = Some(block);
            true
        }
        None => false,
    }
}

impl std::fmt::Debug for ClientBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ClientBuffer")
            .field("kind", &state.backing.kind())
            .field("offset", &state.offset)
            .field("size", &state.size)
            .field("meta", &state.meta)
            .finish()
    }
}
