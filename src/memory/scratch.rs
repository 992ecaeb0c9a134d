//! Pooled scratch allocator.
//!
//! A [`ScratchPool`] recycles byte blocks of the same or larger size so that
//! per-frame staging memory is not allocated over and over. Blocks carry a
//! weak link back to their pool and return themselves on drop.
//!
//! # Accounting
//!
//! `used` counts every byte the pool has allocated and not yet evicted,
//! whether the block is currently handed out or sitting on the free list.
//! It never exceeds the configured capacity. When a new allocation would
//! overflow it, free blocks are evicted from the tail of the free list until
//! the request fits.
//!
//! # Example
//!
//! ```rust
//! use slotline::memory::ScratchPool;
//!
//! let pool = ScratchPool::new(4096);
//! let block = pool.acquire(1024).expect("fits in an empty pool");
//! assert_eq!(block.capacity(), 1024);
//! drop(block);
//!
//! // The same memory comes back for a smaller request.
//! let again = pool.acquire(512).unwrap();
//! assert_eq!(again.capacity(), 1024);
//! ```

use crate::observability;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Pool of reusable byte blocks bounded by a total byte capacity.
pub struct ScratchPool {
    name: String,
    capacity: usize,
    state: Mutex<ScratchState>,
}

struct ScratchState {
    /// Bytes allocated by this pool and not evicted yet.
    used: usize,
    /// Free blocks, most recently returned first.
    free: VecDeque<Vec<u8>>,
}

impl ScratchPool {
    /// Create a pool that never holds more than `capacity` bytes.
    pub fn new(capacity: usize) -> Arc<Self> {
        Self::with_name("slotline-scratch", capacity)
    }

    /// Create a pool with a name used in logs and metrics.
    pub fn with_name(name: &str, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            capacity,
            state: Mutex::new(ScratchState {
                used: 0,
                free: VecDeque::new(),
            }),
        })
    }

    /// Acquire a block of at least `capacity` bytes.
    ///
    /// Returns `None` when the pool capacity would be exceeded even after
    /// evicting free blocks. This is transient: blocks held by others come
    /// back when they are dropped.
    pub fn acquire(self: &Arc<Self>, capacity: usize) -> Option<ScratchBlock> {
        let mut state = self.state.lock();

        if let Some(pos) = state.free.iter().position(|v| v.len() >= capacity) {
            let data = state.free.remove(pos)?;
            return Some(ScratchBlock {
                data,
                pool: Arc::downgrade(self),
            });
        }

        while state.used + capacity > self.capacity {
            match state.free.pop_back() {
                Some(evicted) => state.used -= evicted.len(),
                None => break,
            }
        }
        if state.used + capacity > self.capacity {
            tracing::debug!(
                pool = %self.name,
                used = state.used,
                requested = capacity,
                capacity = self.capacity,
                "scratch pool exhausted"
            );
            observability::record_transient_exhaustion(&self.name);
            return None;
        }

        state.used += capacity;
        observability::record_scratch_used(&self.name, state.used);
        Some(ScratchBlock {
            data: vec![0u8; capacity],
            pool: Arc::downgrade(self),
        })
    }

    /// Total byte capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently accounted to the pool (handed out or free).
    pub fn used(&self) -> usize {
        self.state.lock().used
    }

    /// Number of blocks waiting on the free list.
    pub fn free_blocks(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Get the pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn give_back(&self, data: Vec<u8>) {
        self.state.lock().free.push_front(data);
    }
}

impl std::fmt::Debug for ScratchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScratchPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("used", &state.used)
            .field("free_blocks", &state.free.len())
            .finish()
    }
}

/// A block handed out by a [`ScratchPool`].
///
/// The holder has exclusive access. Dropping the block puts its memory back
/// at the front of the pool's free list, or frees it if the pool is gone.
pub struct ScratchBlock {
    data: Vec<u8>,
    pool: Weak<ScratchPool>,
}

impl ScratchBlock {
    /// Create a block that belongs to no pool.
    pub fn unpooled(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            pool: Weak::new(),
        }
    }

    /// Size of the block in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Get the block as a byte slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get the block as a mutable byte slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for ScratchBlock {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.give_back(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for ScratchBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBlock")
            .field("capacity", &self.data.len())
            .field("pooled", &(self.pool.strong_count() > 0))
            .finish()
    }
}
