//! Error types for slotline.

use thiserror::Error;

/// Result type alias using slotline's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for slotline operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Memory pool is exhausted (no block can be handed out right now).
    #[error("memory pool exhausted: no blocks available")]
    PoolExhausted,

    /// Every slot of an array-backed table is owned or still in flight.
    #[error("no slot available")]
    NoSlotAvailable,

    /// Memory allocation failed and cannot succeed by waiting.
    #[error("memory allocation failed: {0}")]
    AllocationFailed(String),

    /// The buffer is not tracked by the table it was returned to.
    #[error("buffer is not tracked by this channel")]
    UnknownBuffer,

    /// Queuing was attempted while the channel is stopped.
    #[error("channel is not running")]
    NotRunning,

    /// The direction has no buffer strategy installed yet.
    #[error("{0} buffers are not configured")]
    NotConfigured(&'static str),

    /// The engine broke the work-item contract.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The engine reported that a work item failed.
    #[error("engine reported failure (status {0})")]
    EngineFailed(i32),

    /// The caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Decryption of a secure input buffer failed.
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// How an error is handled by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Resource exhaustion; the caller retries later.
    Transient,
    /// The engine broke an invariant; escalated as fatal.
    Protocol,
    /// The client returned something the channel does not know about.
    Inconsistent,
    /// The channel is not in a state that accepts the call; not an error
    /// of the stream itself.
    State,
    /// Local failure that waiting will not fix.
    Fatal,
}

impl Error {
    /// Category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::PoolExhausted | Error::NoSlotAvailable => ErrorCategory::Transient,
            Error::ProtocolViolation(_) => ErrorCategory::Protocol,
            Error::UnknownBuffer => ErrorCategory::Inconsistent,
            Error::NotRunning => ErrorCategory::State,
            Error::AllocationFailed(_)
            | Error::NotConfigured(_)
            | Error::EngineFailed(_)
            | Error::InvalidArgument(_)
            | Error::Decrypt(_) => ErrorCategory::Fatal,
        }
    }

    /// Returns true if retrying later may succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Returns true if the error must be surfaced through the error callback.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Protocol | ErrorCategory::Fatal
        )
    }
}
