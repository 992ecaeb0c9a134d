//! Input buffer strategies.

use super::InputRole;
use crate::buffer::{ClientBuffer, EngineBuffer};
use crate::channel::ChannelConfig;
use crate::error::{Error, Result};
use crate::format::{MediaFormat, PixelFormat};
use crate::memory::{BlockPool, BlockWatch, MemoryUsage, ScratchPool, SecureHeap, SecureRegion};
use crate::slots::{ArraySlots, FlexSlots};
use std::sync::Arc;

/// A secure region and the block it was last paired with.
struct SecureSlot {
    region: SecureRegion,
    block: BlockWatch,
}

/// Produces fresh client buffers for a flexible input table.
enum InputAllocator {
    Linear {
        pool: Arc<dyn BlockPool>,
    },
    EncryptedLinear {
        pool: Arc<dyn BlockPool>,
        usage: MemoryUsage,
        regions: Vec<SecureSlot>,
    },
    Graphic {
        pool: Arc<dyn BlockPool>,
        staging: Arc<ScratchPool>,
        width: u32,
        height: u32,
    },
}

impl InputAllocator {
    fn allocate(&mut self, format: &Arc<MediaFormat>, size: usize) -> Result<ClientBuffer> {
        match self {
            InputAllocator::Linear { pool } => {
                let block = pool.fetch_linear_block(size, MemoryUsage::CPU_READ_WRITE)?;
                Ok(ClientBuffer::linear(Arc::clone(format), block))
            }
            InputAllocator::EncryptedLinear {
                pool,
                usage,
                regions,
            } => {
                let Some(slot) = regions.iter_mut().find(|slot| slot.block.is_expired()) else {
                    tracing::trace!(regions = regions.len(), "every secure region is in use");
                    return Err(Error::PoolExhausted);
                };
                let block = pool.fetch_linear_block(size, *usage)?;
                slot.block = block.downgrade();
                Ok(ClientBuffer::encrypted(
                    Arc::clone(format),
                    block,
                    slot.region.clone(),
                ))
            }
            InputAllocator::Graphic {
                pool,
                staging,
                width,
                height,
            } => {
                let block = pool.fetch_graphic_block(
                    *width,
                    *height,
                    PixelFormat::Yv12,
                    MemoryUsage::CPU_READ_WRITE,
                )?;
                let scratch = staging
                    .acquire(block.frame_size())
                    .ok_or(Error::PoolExhausted)?;
                ClientBuffer::graphic(Arc::clone(format), block, scratch)
            }
        }
    }
}

enum InputMode {
    Flex {
        slots: FlexSlots,
        alloc: InputAllocator,
    },
    Passthrough,
    Array(ArraySlots),
}

/// Input side of a channel: hands empty buffers to the client and takes
/// filled ones back for the engine.
pub struct InputBuffers {
    role: InputRole,
    format: Arc<MediaFormat>,
    /// Capacity of buffers requested while flexible.
    request_size: usize,
    /// Capacity of buffers allocated for array mode.
    array_size: usize,
    mode: InputMode,
}

impl InputBuffers {
    /// Create the strategy for `role`.
    ///
    /// Linear capacity is the format's maximum input size, or
    /// [`ChannelConfig::linear_buffer_size`] when the format has none.
    pub fn new(
        role: InputRole,
        format: MediaFormat,
        pool: Arc<dyn BlockPool>,
        config: &ChannelConfig,
    ) -> Result<Self> {
        let request_size = format.max_input_size.unwrap_or(config.linear_buffer_size);
        let mode = match role {
            InputRole::Linear => InputMode::Flex {
                slots: FlexSlots::new(),
                alloc: InputAllocator::Linear { pool },
            },
            InputRole::EncryptedLinear { secure } => {
                let usage = if secure {
                    MemoryUsage::READ_PROTECTED
                } else {
                    MemoryUsage::CPU_READ_WRITE
                };
                let heap =
                    SecureHeap::new(config.linear_buffer_size * config.secure_region_count);
                let mut regions = Vec::with_capacity(config.secure_region_count);
                for _ in 0..config.secure_region_count {
                    let Some(region) = heap.allocate(config.linear_buffer_size) else {
                        tracing::debug!(
                            allocated = regions.len(),
                            "secure heap ran out of regions"
                        );
                        break;
                    };
                    regions.push(SecureSlot {
                        region,
                        block: BlockWatch::default(),
                    });
                }
                InputMode::Flex {
                    slots: FlexSlots::new(),
                    alloc: InputAllocator::EncryptedLinear {
                        pool,
                        usage,
                        regions,
                    },
                }
            }
            InputRole::Graphic => {
                let (width, height) = format.dimensions().ok_or_else(|| {
                    Error::InvalidArgument("graphic input needs width and height".into())
                })?;
                InputMode::Flex {
                    slots: FlexSlots::new(),
                    alloc: InputAllocator::Graphic {
                        pool,
                        staging: ScratchPool::with_name(
                            "slotline-graphic-input",
                            config.graphic_scratch_capacity,
                        ),
                        width,
                        height,
                    },
                }
            }
            InputRole::Passthrough => InputMode::Passthrough,
        };
        Ok(Self {
            role,
            format: Arc::new(format),
            request_size,
            array_size: config.linear_buffer_size,
            mode,
        })
    }

    /// Role this strategy was created for.
    pub fn role(&self) -> InputRole {
        self.role
    }

    /// Format attached to buffers handed out.
    pub fn format(&self) -> &Arc<MediaFormat> {
        &self.format
    }

    /// Returns true once the strategy uses a fixed buffer array.
    pub fn is_array_mode(&self) -> bool {
        !matches!(self.mode, InputMode::Flex { .. })
    }

    /// Get an empty buffer for the client.
    ///
    /// Exhaustion is reported as [`Error::PoolExhausted`] or
    /// [`Error::NoSlotAvailable`]; a passthrough strategy never has buffers.
    pub fn request_new_buffer(&mut self) -> Result<(usize, ClientBuffer)> {
        match &mut self.mode {
            InputMode::Flex { slots, alloc } => {
                let buffer = alloc.allocate(&self.format, self.request_size)?;
                let index = slots.assign(buffer.clone());
                Ok((index, buffer))
            }
            InputMode::Passthrough => Err(Error::NoSlotAvailable),
            InputMode::Array(slots) => {
                let (index, buffer) = slots.grab(|_| true)?;
                buffer.set_format(Arc::clone(&self.format));
                Ok((index, buffer))
            }
        }
    }

    /// Take a buffer back from the client and get its engine form.
    pub fn release_buffer(&mut self, buffer: &ClientBuffer) -> Result<Option<EngineBuffer>> {
        match &mut self.mode {
            InputMode::Flex { slots, .. } => slots.release(buffer),
            InputMode::Passthrough => Err(Error::UnknownBuffer),
            InputMode::Array(slots) => slots.return_buffer(buffer),
        }
    }

    /// Forget every buffer the client holds.
    pub fn flush(&mut self) {
        match &mut self.mode {
            InputMode::Flex { slots, .. } => slots.flush(),
            InputMode::Passthrough => {}
            InputMode::Array(slots) => slots.flush(),
        }
    }

    /// Switch to a fixed array of at least `min_size` buffers.
    ///
    /// Does nothing if the strategy is already in array mode.
    pub fn to_array_mode(&mut self, min_size: usize) -> Result<()> {
        let array = match &mut self.mode {
            InputMode::Flex { slots, alloc } => {
                let format = &self.format;
                let size = self.array_size;
                ArraySlots::initialize(slots, min_size, || alloc.allocate(format, size))?
            }
            InputMode::Passthrough | InputMode::Array(_) => return Ok(()),
        };
        self.mode = InputMode::Array(array);
        Ok(())
    }

    /// The fixed buffer array, if in array mode.
    pub fn buffer_array(&self) -> Option<Vec<ClientBuffer>> {
        match &self.mode {
            InputMode::Flex { .. } => None,
            InputMode::Passthrough => Some(Vec::new()),
            InputMode::Array(slots) => Some(slots.buffers()),
        }
    }
}

impl std::fmt::Debug for InputBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBuffers")
            .field("role", &self.role)
            .field("array_mode", &self.is_array_mode())
            .field("request_size", &self.request_size)
            .finish()
    }
}
