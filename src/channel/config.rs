//! Channel configuration.

use crate::memory::defaults::{
    GRAPHIC_SCRATCH_CAPACITY, LINEAR_BUFFER_SIZE, MAX_GRAPHIC_BUFFER_REFS, MIN_BUFFER_ARRAY_SIZE,
    SECURE_REGION_COUNT,
};

/// Sizes and counts used by a [`BufferChannel`](super::BufferChannel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Minimum slots in an array-mode table, and input buffers primed on start.
    pub min_buffer_array_size: usize,
    /// Linear input capacity when the format has no maximum input size.
    pub linear_buffer_size: usize,
    /// Frames the output surface may still read after they were queued.
    pub max_graphic_buffer_refs: usize,
    /// Byte budget of each scratch pool staging graphic buffers.
    pub graphic_scratch_capacity: usize,
    /// Secure regions pre-allocated for encrypted input.
    pub secure_region_count: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            min_buffer_array_size: MIN_BUFFER_ARRAY_SIZE,
            linear_buffer_size: LINEAR_BUFFER_SIZE,
            max_graphic_buffer_refs: MAX_GRAPHIC_BUFFER_REFS,
            graphic_scratch_capacity: GRAPHIC_SCRATCH_CAPACITY,
            secure_region_count: SECURE_REGION_COUNT,
        }
    }
}

impl ChannelConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum array size and start-up buffer count.
    pub fn with_min_buffer_array_size(mut self, count: usize) -> Self {
        self.min_buffer_array_size = count;
        self
    }

    /// Set the default linear input capacity.
    pub fn with_linear_buffer_size(mut self, size: usize) -> Self {
        self.linear_buffer_size = size;
        self
    }

    /// Set how many rendered frames the output surface may hold.
    pub fn with_max_graphic_buffer_refs(mut self, count: usize) -> Self {
        self.max_graphic_buffer_refs = count;
        self
    }

    /// Set the graphic staging budget.
    pub fn with_graphic_scratch_capacity(mut self, bytes: usize) -> Self {
        self.graphic_scratch_capacity = bytes;
        self
    }

    /// Set the number of secure regions.
    pub fn with_secure_region_count(mut self, count: usize) -> Self {
        self.secure_region_count = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.min_buffer_array_size, 16);
        assert_eq!(config.linear_buffer_size, 524_288);
        assert_eq!(config.max_graphic_buffer_refs, 4);
        assert_eq!(config.graphic_scratch_capacity, 1920 * 1080 * 16);
        assert_eq!(config.secure_region_count, 16);
    }

    #[test]
    fn test_builder() {
        let config = ChannelConfig::new()
            .with_min_buffer_array_size(4)
            .with_linear_buffer_size(1024)
            .with_max_graphic_buffer_refs(2)
            .with_graphic_scratch_capacity(4096)
            .with_secure_region_count(3);
        assert_eq!(config.min_buffer_array_size, 4);
        assert_eq!(config.linear_buffer_size, 1024);
        assert_eq!(config.max_graphic_buffer_refs, 2);
        assert_eq!(config.graphic_scratch_capacity, 4096);
        assert_eq!(config.secure_region_count, 3);
    }
}
