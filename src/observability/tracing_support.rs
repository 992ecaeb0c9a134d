//! Tracing integration for structured logging and spans.

use std::fmt;
use tracing::{Level, Span, span};

/// Which side of a channel a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Buffers the client fills and the engine consumes.
    Input,
    /// Buffers the engine fills and the client consumes.
    Output,
}

impl Direction {
    /// Lowercase name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a span for a buffer channel.
///
/// # Example
///
/// ```rust,ignore
/// use slotline::observability::span_channel;
///
/// let span = span_channel("c2.android.avc.decoder");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_channel(name: &str) -> Span {
    span!(Level::DEBUG, "channel", name = %name)
}

/// Log a slot handed to the client.
#[inline]
pub fn trace_slot_assigned(channel: &str, direction: Direction, index: usize) {
    tracing::trace!(
        channel = %channel,
        direction = %direction,
        index = index,
        "slot assigned"
    );
}

/// Log a buffer returned by the client.
#[inline]
pub fn trace_slot_released(channel: &str, direction: Direction) {
    tracing::trace!(
        channel = %channel,
        direction = %direction,
        "slot released"
    );
}

/// Log a completion dropped because it belongs to a previous run.
#[inline]
pub fn trace_stale_work(channel: &str, frame: u64, first_valid: u64) {
    tracing::debug!(
        channel = %channel,
        frame = frame,
        first_valid = first_valid,
        "dropping stale work"
    );
}

/// Log a fatal error about to be reported to the client.
#[inline]
pub fn trace_fatal(channel: &str, error: &dyn std::error::Error) {
    tracing::error!(
        channel = %channel,
        error = %error,
        "fatal channel error"
    );
}

/// Log a channel lifecycle transition.
#[inline]
pub fn trace_state_change(channel: &str, from: &str, to: &str) {
    tracing::info!(
        channel = %channel,
        from = %from,
        to = %to,
        "channel state changed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Input.to_string(), "input");
        assert_eq!(Direction::Output.as_str(), "output");
    }

    #[test]
    fn test_span_creation() {
        let span = span_channel("test-channel");
        let _guard = span.enter();
    }

    #[test]
    fn test_trace_functions() {
        // No subscriber installed; must not panic.
        trace_slot_assigned("test", Direction::Input, 0);
        trace_slot_released("test", Direction::Output);
        trace_stale_work("test", 4, 9);
        trace_fatal("test", &Error::EngineFailed(-1));
        trace_state_change("test", "stopped", "running");
    }
}
