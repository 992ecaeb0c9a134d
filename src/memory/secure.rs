//! Shared-memory regions for encrypted input.
//!
//! Encrypted input is written by the client into a [`SecureRegion`] and
//! decrypted into the engine's block right before submission. A
//! [`SecureHeap`] carves a fixed number of equally sized regions out of a
//! bounded budget; the input strategy cycles through them, reusing a region
//! only once the block it was last paired with has been dropped everywhere.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Bounded source of secure regions.
#[derive(Debug)]
pub struct SecureHeap {
    capacity: usize,
    allocated: Mutex<usize>,
}

impl SecureHeap {
    /// Create a heap that hands out at most `capacity` bytes of regions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            allocated: Mutex::new(0),
        }
    }

    /// Allocate a region of `size` bytes, or `None` once the budget is spent.
    pub fn allocate(&self, size: usize) -> Option<SecureRegion> {
        let mut allocated = self.allocated.lock();
        if *allocated + size > self.capacity {
            return None;
        }
        *allocated += size;
        Some(SecureRegion {
            memory: Arc::new(Mutex::new(vec![0u8; size])),
        })
    }

    /// Bytes handed out so far.
    pub fn allocated(&self) -> usize {
        *self.allocated.lock()
    }

    /// Total budget in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A region of shared memory holding encrypted input.
///
/// Clones refer to the same memory.
#[derive(Clone)]
pub struct SecureRegion {
    memory: Arc<Mutex<Vec<u8>>>,
}

impl SecureRegion {
    /// Size of the region in bytes.
    pub fn capacity(&self) -> usize {
        self.memory.lock().len()
    }

    /// Copy `bytes` into the region at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut memory = self.memory.lock();
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= memory.len())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "write of {} bytes at {} exceeds secure region of {} bytes",
                    bytes.len(),
                    offset,
                    memory.len()
                ))
            })?;
        memory[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Run `f` over the region contents.
    pub fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.memory.lock())
    }

    /// Returns true if both handles share the same memory.
    pub fn ptr_eq(&self, other: &SecureRegion) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }
}

impl std::fmt::Debug for SecureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureRegion")
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_limits_regions() {
        let heap = SecureHeap::new(4 * 1024);
        let regions: Vec<_> = std::iter::from_fn(|| heap.allocate(1024)).collect();
        assert_eq!(regions.len(), 4);
        assert_eq!(heap.allocated(), heap.capacity());
    }

    #[test]
    fn test_region_write_and_map() {
        let heap = SecureHeap::new(64);
        let region = heap.allocate(16).unwrap();
        region.write(2, &[1, 2, 3]).unwrap();
        region.map(|data| assert_eq!(&data[2..5], &[1, 2, 3]));
        assert!(region.write(15, &[0, 0]).is_err());
    }

    #[test]
    fn test_clones_share_memory() {
        let heap = SecureHeap::new(64);
        let region = heap.allocate(8).unwrap();
        let alias = region.clone();
        alias.write(0, &[5]).unwrap();
        assert!(region.ptr_eq(&alias));
        region.map(|data| assert_eq!(data[0], 5));
    }
}
