//! Observability features: metrics and tracing.
//!
//! - **Metrics**: counters and gauges via `metrics-rs`
//! - **Tracing**: structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `slotline_input_buffers_queued` | Counter | Input buffers submitted to the engine |
//! | `slotline_output_buffers_delivered` | Counter | Output buffers handed to the client |
//! | `slotline_stale_work_dropped` | Counter | Completions dropped as pre-stop generation |
//! | `slotline_transient_exhaustion` | Counter | Allocation or slot requests that hit backpressure |
//! | `slotline_scratch_used_bytes` | Gauge | Bytes accounted to a scratch pool |
//!
//! ## Tracing
//!
//! Each channel carries a span named `channel` with the engine name. Slot
//! assignment, release and work completion are logged at `debug`/`trace`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use slotline::observability::init_metrics;
//!
//! // Describe metrics once at startup; install any metrics exporter.
//! init_metrics();
//! ```

mod metrics;
mod tracing_support;

pub use metrics::{
    ChannelMetrics, init_metrics, record_scratch_used, record_transient_exhaustion,
};
pub use tracing_support::{
    Direction, span_channel, trace_fatal, trace_slot_assigned, trace_slot_released,
    trace_stale_work, trace_state_change,
};
