//! Output buffer strategies.

use super::OutputRole;
use crate::buffer::{ClientBuffer, EngineBuffer};
use crate::channel::{ChannelConfig, Work};
use crate::error::{Error, Result};
use crate::format::{CodecData, MediaFormat};
use crate::memory::ScratchPool;
use crate::slots::{ArraySlots, FlexSlots};
use bytes::Bytes;
use std::sync::Arc;

/// Turns engine output into client buffers for a flexible table.
enum OutputWrapper {
    Linear { array_buffer_size: usize },
    Graphic,
    RawGraphic { staging: Arc<ScratchPool> },
}

impl OutputWrapper {
    fn wrap(
        &self,
        format: &Arc<MediaFormat>,
        buffer: Option<EngineBuffer>,
    ) -> Result<ClientBuffer> {
        let format = Arc::clone(format);
        match (self, buffer) {
            (_, None) => Ok(ClientBuffer::container(format, None)),
            (OutputWrapper::Linear { .. }, Some(buffer)) => {
                ClientBuffer::const_linear(format, buffer)
            }
            (OutputWrapper::Graphic, Some(buffer)) => {
                Ok(ClientBuffer::container(format, Some(buffer)))
            }
            (OutputWrapper::RawGraphic { staging }, Some(buffer)) => {
                ClientBuffer::const_graphic(format, buffer, staging)
            }
        }
    }

    /// Empty copy target for array mode.
    fn array_buffer(&self, format: &Arc<MediaFormat>) -> ClientBuffer {
        let format = Arc::clone(format);
        match self {
            OutputWrapper::Linear { array_buffer_size } => {
                ClientBuffer::local(format, vec![0; *array_buffer_size])
            }
            OutputWrapper::Graphic => ClientBuffer::container(format, None),
            OutputWrapper::RawGraphic { staging } => {
                ClientBuffer::empty_graphic(format, Arc::clone(staging))
            }
        }
    }
}

enum OutputMode {
    Flex {
        slots: FlexSlots,
        wrapper: OutputWrapper,
    },
    Array(ArraySlots),
}

/// Output side of a channel: wraps engine output for the client and takes
/// buffers back once the client is done with them.
pub struct OutputBuffers {
    role: OutputRole,
    format: Arc<MediaFormat>,
    mode: OutputMode,
}

impl OutputBuffers {
    /// Create the strategy for `role`.
    pub fn new(role: OutputRole, format: MediaFormat, config: &ChannelConfig) -> Self {
        let wrapper = match role {
            OutputRole::Linear => OutputWrapper::Linear {
                array_buffer_size: config.linear_buffer_size,
            },
            OutputRole::Graphic => OutputWrapper::Graphic,
            OutputRole::RawGraphic => OutputWrapper::RawGraphic {
                staging: ScratchPool::with_name(
                    "slotline-graphic-output",
                    config.graphic_scratch_capacity,
                ),
            },
        };
        Self {
            role,
            format: Arc::new(format),
            mode: OutputMode::Flex {
                slots: FlexSlots::new(),
                wrapper,
            },
        }
    }

    /// Role this strategy was created for.
    pub fn role(&self) -> OutputRole {
        self.role
    }

    /// Current output format, including the latest `csd-0`.
    pub fn format(&self) -> &Arc<MediaFormat> {
        &self.format
    }

    /// Returns true once the strategy uses a fixed buffer array.
    pub fn is_array_mode(&self) -> bool {
        matches!(self.mode, OutputMode::Array(_))
    }

    /// Put an engine output buffer in a slot for the client.
    ///
    /// `None` registers an empty marker (end of stream without payload).
    /// Malformed buffers are a [`Error::ProtocolViolation`]; lack of a slot or
    /// of staging memory is transient.
    pub fn register_buffer(&mut self, buffer: Option<EngineBuffer>) -> Result<(usize, ClientBuffer)> {
        match &mut self.mode {
            OutputMode::Flex { slots, wrapper } => {
                let client = wrapper.wrap(&self.format, buffer)?;
                let index = slots.assign(client.clone());
                Ok((index, client))
            }
            OutputMode::Array(slots) => {
                let (index, client) = slots.grab(|c| c.can_copy(buffer.as_ref()))?;
                client.set_format(Arc::clone(&self.format));
                if let Err(err) = client.copy_from(buffer.as_ref()) {
                    tracing::debug!(index, error = %err, "copy into array buffer failed");
                    // The slot was just grabbed, so returning it cannot miss.
                    let _ = slots.return_buffer(&client);
                    return Err(err);
                }
                Ok((index, client))
            }
        }
    }

    /// Put codec-specific data in a slot for the client, and record it as
    /// `csd-0` of the output format.
    pub fn register_csd(&mut self, csd: &[u8]) -> Result<(usize, ClientBuffer)> {
        let data = CodecData::new(Bytes::copy_from_slice(csd));
        match &mut self.mode {
            OutputMode::Flex { slots, .. } => {
                self.format = self.format.with_csd(0, data);
                let client = ClientBuffer::local(Arc::clone(&self.format), csd.to_vec());
                let index = slots.assign(client.clone());
                Ok((index, client))
            }
            OutputMode::Array(slots) => {
                let fits = |c: &ClientBuffer| c.has_bytes() && c.capacity() >= csd.len();
                let (index, client) = match slots.grab(fits) {
                    Ok(grabbed) => grabbed,
                    Err(Error::NoSlotAvailable) if !slots.any(fits) => {
                        return Err(Error::ProtocolViolation(format!(
                            "no array buffer can hold {} bytes of codec data",
                            csd.len()
                        )));
                    }
                    Err(err) => return Err(err),
                };
                self.format = self.format.with_csd(0, data);
                client.fill(csd)?;
                client.set_format(Arc::clone(&self.format));
                Ok((index, client))
            }
        }
    }

    /// Take a buffer back from the client and get its engine form.
    pub fn release_buffer(&mut self, buffer: &ClientBuffer) -> Result<Option<EngineBuffer>> {
        match &mut self.mode {
            OutputMode::Flex { slots, .. } => slots.release(buffer),
            OutputMode::Array(slots) => slots.return_buffer(buffer),
        }
    }

    /// Forget every buffer the client holds.
    ///
    /// `flushed` lists the work the engine discarded; none of it reached
    /// this table, so only client ownership is reset.
    pub fn flush(&mut self, flushed: &[Work]) {
        tracing::trace!(flushed = flushed.len(), role = ?self.role, "flushing output buffers");
        match &mut self.mode {
            OutputMode::Flex { slots, .. } => slots.flush(),
            OutputMode::Array(slots) => slots.flush(),
        }
    }

    /// Switch to a fixed array of at least `min_size` buffers.
    ///
    /// Does nothing if the strategy is already in array mode.
    pub fn to_array_mode(&mut self, min_size: usize) -> Result<()> {
        let array = match &self.mode {
            OutputMode::Flex { slots, wrapper } => {
                let format = &self.format;
                ArraySlots::initialize(slots, min_size, || Ok(wrapper.array_buffer(format)))?
            }
            OutputMode::Array(_) => return Ok(()),
        };
        self.mode = OutputMode::Array(array);
        Ok(())
    }

    /// The fixed buffer array, if in array mode.
    pub fn buffer_array(&self) -> Option<Vec<ClientBuffer>> {
        match &self.mode {
            OutputMode::Flex { .. } => None,
            OutputMode::Array(slots) => Some(slots.buffers()),
        }
    }
}

impl std::fmt::Debug for OutputBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffers")
            .field("role", &self.role)
            .field("array_mode", &self.is_array_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferData, LinearView};
    use crate::format::PixelFormat;
    use crate::memory::{GraphicBlock, LinearBlock};

    fn config() -> ChannelConfig {
        ChannelConfig::new()
            .with_linear_buffer_size(64)
            .with_graphic_scratch_capacity(1024)
    }

    fn linear(bytes: &[u8]) -> EngineBuffer {
        EngineBuffer::linear(LinearView::full(LinearBlock::from_slice(bytes)))
    }

    fn image() -> EngineBuffer {
        EngineBuffer::graphic(GraphicBlock::heap(8, 8, PixelFormat::Yv12))
    }

    #[test]
    fn test_linear_wraps_engine_buffer() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/raw"), &config());
        let engine = linear(b"pcm");
        let (index, client) = output.register_buffer(Some(engine.clone())).unwrap();
        assert_eq!(index, 0);
        assert_eq!(client.to_vec(), b"pcm");

        let back = output.release_buffer(&client).unwrap().unwrap();
        assert!(back.ptr_eq(&engine));
    }

    #[test]
    fn test_linear_rejects_malformed_output() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/raw"), &config());
        let err = output.register_buffer(Some(image())).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));

        let two = EngineBuffer::new(BufferData::Linear(smallvec::smallvec![
            LinearView::full(LinearBlock::heap(1)),
            LinearView::full(LinearBlock::heap(1)),
        ]));
        let err = output.register_buffer(Some(two)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_buffer_registers_marker() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/raw"), &config());
        let (_, client) = output.register_buffer(None).unwrap();
        assert_eq!(client.size(), 0);
        assert!(output.release_buffer(&client).unwrap().is_none());
    }

    #[test]
    fn test_csd_updates_format() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/aac"), &config());
        let (_, client) = output.register_csd(&[0x12, 0x10]).unwrap();
        assert_eq!(client.to_vec(), [0x12, 0x10]);
        assert_eq!(output.format().csd(0).unwrap().as_slice(), &[0x12, 0x10]);
        assert_eq!(client.format().csd(0).unwrap().as_slice(), &[0x12, 0x10]);
    }

    #[test]
    fn test_raw_graphic_copies_and_exhausts() {
        let mut output = OutputBuffers::new(
            OutputRole::RawGraphic,
            MediaFormat::video("video/raw", 8, 8),
            &config(),
        );
        // 96-byte frames in a 1024-byte scratch pool.
        let held: Vec<_> = (0..10)
            .map(|_| output.register_buffer(Some(image())).unwrap().1)
            .collect();
        assert_eq!(held[0].size(), 96);
        assert_eq!(
            output.register_buffer(Some(image())).unwrap_err(),
            Error::PoolExhausted
        );
    }

    #[test]
    fn test_array_copies_linear_output() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/raw"), &config());
        output.to_array_mode(2).unwrap();
        assert!(output.is_array_mode());

        let engine = linear(b"frame");
        let weak = engine.downgrade();
        let (_, client) = output.register_buffer(Some(engine)).unwrap();
        assert_eq!(client.to_vec(), b"frame");
        assert!(weak.is_expired());

        let too_big = linear(&[0; 65]);
        assert_eq!(
            output.register_buffer(Some(too_big)).unwrap_err(),
            Error::NoSlotAvailable
        );
    }

    #[test]
    fn test_array_container_cycles() {
        let mut output = OutputBuffers::new(
            OutputRole::Graphic,
            MediaFormat::video("video/raw", 8, 8),
            &config(),
        );
        output.to_array_mode(1).unwrap();

        let (index, client) = output.register_buffer(Some(image())).unwrap();
        assert_eq!(
            output.register_buffer(Some(image())).unwrap_err(),
            Error::NoSlotAvailable
        );

        let engine = output.release_buffer(&client).unwrap();
        assert!(engine.is_some());
        drop(engine);
        assert_eq!(output.register_buffer(Some(image())).unwrap().0, index);
    }

    #[test]
    fn test_array_csd_that_can_never_fit() {
        let mut output = OutputBuffers::new(
            OutputRole::Graphic,
            MediaFormat::video("video/raw", 8, 8),
            &config(),
        );
        output.to_array_mode(2).unwrap();
        let err = output.register_csd(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn test_array_csd_waits_for_slot() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/raw"), &config());
        output.to_array_mode(1).unwrap();
        let (_, client) = output.register_csd(&[1, 2, 3]).unwrap();
        assert_eq!(client.to_vec(), [1, 2, 3]);

        assert_eq!(
            output.register_csd(&[4]).unwrap_err(),
            Error::NoSlotAvailable
        );
        output.release_buffer(&client).unwrap();
        assert!(output.register_csd(&[4]).is_ok());
        assert_eq!(output.format().csd(0).unwrap().as_slice(), &[4]);
    }

    #[test]
    fn test_flush_resets_array_ownership() {
        let mut output =
            OutputBuffers::new(OutputRole::Linear, MediaFormat::audio("audio/raw"), &config());
        output.to_array_mode(1).unwrap();
        output.register_buffer(Some(linear(b"a"))).unwrap();
        output.flush(&[]);
        assert!(output.register_buffer(Some(linear(b"b"))).is_ok());
    }
}
