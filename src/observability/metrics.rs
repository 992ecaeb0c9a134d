//! Metrics collection using metrics-rs.

use metrics::{Counter, Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const INPUT_BUFFERS_QUEUED: &str = "slotline_input_buffers_queued";
const OUTPUT_BUFFERS_DELIVERED: &str = "slotline_output_buffers_delivered";
const STALE_WORK_DROPPED: &str = "slotline_stale_work_dropped";
const TRANSIENT_EXHAUSTION: &str = "slotline_transient_exhaustion";
const SCRATCH_USED_BYTES: &str = "slotline_scratch_used_bytes";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        INPUT_BUFFERS_QUEUED,
        Unit::Count,
        "Input buffers submitted to the engine"
    );
    metrics::describe_counter!(
        OUTPUT_BUFFERS_DELIVERED,
        Unit::Count,
        "Output buffers delivered to the client"
    );
    metrics::describe_counter!(
        STALE_WORK_DROPPED,
        Unit::Count,
        "Completed work dropped because it predates the last stop"
    );
    metrics::describe_counter!(
        TRANSIENT_EXHAUSTION,
        Unit::Count,
        "Requests refused because no block or slot was free"
    );
    metrics::describe_gauge!(
        SCRATCH_USED_BYTES,
        Unit::Bytes,
        "Bytes allocated by a scratch pool"
    );
}

/// Record a backpressure event against `resource` (a pool or channel name).
#[inline]
pub fn record_transient_exhaustion(resource: &str) {
    counter!(TRANSIENT_EXHAUSTION, "resource" => resource.to_string()).increment(1);
}

/// Record the bytes accounted to a scratch pool.
#[inline]
pub fn record_scratch_used(pool_name: &str, used: usize) {
    gauge!(SCRATCH_USED_BYTES, "pool" => pool_name.to_string()).set(used as f64);
}

/// Counters for one channel, labelled with the engine name.
#[derive(Clone)]
pub struct ChannelMetrics {
    name: String,
    input_queued: Counter,
    output_delivered: Counter,
    stale_dropped: Counter,
    exhausted: Counter,
}

impl ChannelMetrics {
    /// Create the counters for a channel.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            input_queued: counter!(INPUT_BUFFERS_QUEUED, "channel" => name.to_string()),
            output_delivered: counter!(OUTPUT_BUFFERS_DELIVERED, "channel" => name.to_string()),
            stale_dropped: counter!(STALE_WORK_DROPPED, "channel" => name.to_string()),
            exhausted: counter!(TRANSIENT_EXHAUSTION, "resource" => name.to_string()),
        }
    }

    /// Record an input buffer handed to the engine.
    #[inline]
    pub fn record_input_queued(&self) {
        self.input_queued.increment(1);
    }

    /// Record an output buffer handed to the client.
    #[inline]
    pub fn record_output_delivered(&self) {
        self.output_delivered.increment(1);
    }

    /// Record a completion dropped as stale.
    #[inline]
    pub fn record_stale_dropped(&self) {
        self.stale_dropped.increment(1);
    }

    /// Record a request refused for lack of a slot or block.
    #[inline]
    pub fn record_exhausted(&self) {
        self.exhausted.increment(1);
    }

    /// Get the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ChannelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMetrics")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
