//! Admission gate between buffer submission and `stop()`.
//!
//! The gate holds a counter: `-1` while stopped, otherwise the number of
//! submissions in flight. A [`QueueGuard`] is taken around every submission;
//! [`QueueSync::stop`] waits for the guards taken before it to be dropped and
//! makes every later guard fail.
//!
//! ```rust,ignore
//! let sync = QueueSync::new();
//! sync.start();
//! {
//!     let guard = QueueGuard::new(&sync);
//!     assert!(guard.is_running());
//!     // submit work
//! }
//! sync.stop();
//! assert!(!QueueGuard::new(&sync).is_running());
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};

const STOPPED: i32 = -1;

/// Counter gating submissions against stop transitions.
#[derive(Debug)]
pub struct QueueSync {
    /// Serializes admission checks with `start`/`stop`.
    guard: Mutex<()>,
    count: AtomicI32,
}

impl QueueSync {
    /// Create a stopped gate.
    pub fn new() -> Self {
        Self {
            guard: Mutex::new(()),
            count: AtomicI32::new(STOPPED),
        }
    }

    /// Open the gate. Does nothing if already running.
    pub fn start(&self) {
        let _lock = self.guard.lock();
        let _ = self
            .count
            .compare_exchange(STOPPED, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Close the gate and wait for in-flight submissions to finish.
    ///
    /// Does nothing if already stopped.
    pub fn stop(&self) {
        let _lock = self.guard.lock();
        if self.count.load(Ordering::Acquire) == STOPPED {
            return;
        }
        // New guards block on the mutex; only existing ones can still drop.
        while self
            .count
            .compare_exchange_weak(0, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            std::thread::yield_now();
        }
    }

    /// Returns true if the gate is open.
    pub fn is_running(&self) -> bool {
        self.count.load(Ordering::Acquire) != STOPPED
    }

    /// Number of guards currently admitted.
    pub fn in_flight(&self) -> usize {
        self.count.load(Ordering::Acquire).max(0) as usize
    }
}

impl Default for QueueSync {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped admission through a [`QueueSync`].
///
/// Admitted guards keep `stop()` waiting until they are dropped.
#[must_use = "admission ends when the guard is dropped"]
#[derive(Debug)]
pub struct QueueGuard<'a> {
    sync: &'a QueueSync,
    running: bool,
}

impl<'a> QueueGuard<'a> {
    /// Try to enter the gate.
    pub fn new(sync: &'a QueueSync) -> Self {
        let _lock = sync.guard.lock();
        let running = sync.count.load(Ordering::Acquire) != STOPPED;
        if running {
            sync.count.fetch_add(1, Ordering::AcqRel);
        }
        Self { sync, running }
    }

    /// Returns true if the guard was admitted.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        if self.running {
            self.sync.count.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn test_starts_stopped() {
        let sync = QueueSync::new();
        assert!(!sync.is_running());
        assert!(!QueueGuard::new(&sync).is_running());
        assert_eq!(sync.in_flight(), 0);
    }

    #[test]
    fn test_guard_counts_in_flight() {
        let sync = QueueSync::new();
        sync.start();
        sync.start();

        let a = QueueGuard::new(&sync);
        let b = QueueGuard::new(&sync);
        assert!(a.is_running() && b.is_running());
        assert_eq!(sync.in_flight(), 2);

        drop(a);
        drop(b);
        assert_eq!(sync.in_flight(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let sync = QueueSync::new();
        sync.stop();
        sync.start();
        sync.stop();
        sync.stop();
        assert!(!sync.is_running());
    }

    #[test]
    fn test_stop_waits_for_guard() {
        let sync = Arc::new(QueueSync::new());
        sync.start();
        let guard_released = Arc::new(AtomicBool::new(false));

        let guard = QueueGuard::new(&sync);
        let stopper = {
            let sync = Arc::clone(&sync);
            let released = Arc::clone(&guard_released);
            std::thread::spawn(move || {
                sync.stop();
                assert!(released.load(Ordering::SeqCst));
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        guard_released.store(true, Ordering::SeqCst);
        drop(guard);

        stopper.join().unwrap();
        assert!(!QueueGuard::new(&sync).is_running());
    }

    #[test]
    fn test_restart_after_stop() {
        let sync = QueueSync::new();
        sync.start();
        sync.stop();
        sync.start();
        assert!(QueueGuard::new(&sync).is_running());
    }
}
