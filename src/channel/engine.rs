//! Collaborators the channel talks to.
//!
//! The channel never implements codec work itself. It submits [`Work`] to an
//! [`Engine`], gets buffers from the engine's [`BlockPool`]s and forwards
//! rendered frames to an [`OutputSurface`].

use super::Work;
use crate::buffer::EngineBuffer;
use crate::error::Result;
use crate::format::MediaKind;
use crate::memory::{BlockPool, BlockPoolKind};
use bytes::Bytes;
use std::sync::Arc;

/// The codec behind a channel.
///
/// Completed work comes back through
/// [`BufferChannel::on_work_done`](super::BufferChannel::on_work_done).
pub trait Engine: Send + Sync {
    /// Engine name. Names ending in `.secure` read protected memory only.
    fn name(&self) -> &str;

    /// Media kinds of the input and output streams.
    fn stream_kinds(&self) -> (MediaKind, MediaKind);

    /// Block pool of the given kind.
    fn block_pool(&self, kind: BlockPoolKind) -> Result<Arc<dyn BlockPool>>;

    /// Submit work items.
    fn queue(&self, items: Vec<Work>) -> Result<()>;

    /// Returns true if the engine only reads protected memory.
    fn is_secure(&self) -> bool {
        self.name().ends_with(".secure")
    }
}

/// Source that feeds the engine directly, bypassing input buffers.
pub trait InputSurface: Send + Sync {
    /// Start feeding `engine`.
    fn connect(&self, engine: &Arc<dyn Engine>) -> Result<()>;

    /// Stop feeding.
    fn disconnect(&self);
}

/// Display sink for rendered output.
pub trait OutputSurface: Send + Sync {
    /// Queue an image for display at `timestamp_ns`.
    fn queue_buffer(&self, buffer: &EngineBuffer, timestamp_ns: i64) -> Result<()>;
}

/// Cipher mode of encrypted input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CryptoMode {
    /// Data is in the clear.
    #[default]
    Unencrypted,
    /// AES in counter mode.
    AesCtr,
    /// AES in cipher-block-chaining mode.
    AesCbc,
}

/// Clear and encrypted byte counts of one subsample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubSample {
    /// Leading clear bytes.
    pub clear_bytes: usize,
    /// Following encrypted bytes.
    pub encrypted_bytes: usize,
}

/// Parameters for decrypting one input buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptRequest {
    /// Key id.
    pub key: Bytes,
    /// Initialization vector.
    pub iv: Bytes,
    /// Cipher mode.
    pub mode: CryptoMode,
    /// Subsample layout of the payload.
    pub subsamples: Vec<SubSample>,
    /// Destination is protected memory.
    pub secure: bool,
}

impl DecryptRequest {
    /// Total bytes covered by the subsamples.
    pub fn total_bytes(&self) -> usize {
        self.subsamples
            .iter()
            .map(|s| s.clear_bytes + s.encrypted_bytes)
            .sum()
    }
}

/// Decrypts secure input before submission.
pub trait Decryptor: Send + Sync {
    /// Decrypt `src` into `dst` and return the bytes written.
    fn decrypt(&self, request: &DecryptRequest, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Named(&'static str);

    impl Engine for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn stream_kinds(&self) -> (MediaKind, MediaKind) {
            (MediaKind::Audio, MediaKind::Audio)
        }

        fn block_pool(&self, _kind: BlockPoolKind) -> Result<Arc<dyn BlockPool>> {
            Err(Error::NotConfigured("input"))
        }

        fn queue(&self, _items: Vec<Work>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_secure_engine_name() {
        assert!(Named("c2.vendor.avc.decoder.secure").is_secure());
        assert!(!Named("c2.vendor.avc.decoder").is_secure());
    }

    #[test]
    fn test_decrypt_request_total() {
        let request = DecryptRequest {
            subsamples: vec![
                SubSample {
                    clear_bytes: 4,
                    encrypted_bytes: 16,
                },
                SubSample {
                    clear_bytes: 2,
                    encrypted_bytes: 0,
                },
            ],
            ..Default::default()
        };
        assert_eq!(request.total_bytes(), 22);
    }
}
