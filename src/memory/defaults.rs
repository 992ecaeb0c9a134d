//! Default sizes and counts for channel buffers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use slotline::memory::{ScratchPool, defaults};
//!
//! let staging = ScratchPool::new(defaults::GRAPHIC_SCRATCH_CAPACITY);
//! ```

// =============================================================================
// Buffer counts
// =============================================================================

/// Minimum number of slots in an array-mode table, and the number of input
/// buffers offered to the client when a channel starts.
pub const MIN_BUFFER_ARRAY_SIZE: usize = 16;

/// Number of frames the output surface may still be reading after they were
/// queued. The channel keeps one more than this alive.
pub const MAX_GRAPHIC_BUFFER_REFS: usize = 4;

/// Number of secure regions pre-allocated for encrypted input.
pub const SECURE_REGION_COUNT: usize = MIN_BUFFER_ARRAY_SIZE;

// =============================================================================
// Buffer sizes (bytes)
// =============================================================================

/// Capacity of a linear input buffer when the format gives no maximum
/// input size (512 KiB).
pub const LINEAR_BUFFER_SIZE: usize = 512 * 1024;

/// Capacity of the scratch pool staging graphic buffers: sixteen 1080p frames
/// at one byte per pixel, or a bit over ten YV12 frames.
pub const GRAPHIC_SCRATCH_CAPACITY: usize = 1920 * 1080 * 16;
