//! Notifications from the channel to its client.
//!
//! Implement [`ChannelCallback`] directly, or use an [`EventQueue`] to receive
//! the same notifications as [`ChannelEvent`] values over a `kanal` channel.

use crate::buffer::ClientBuffer;
use crate::error::Error;

/// How the client should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// The channel cannot continue; tear it down.
    Fatal,
    /// The channel keeps working; the error is informational.
    Recoverable,
}

/// Receives buffer and error notifications.
///
/// Called from whichever thread drives the channel, never with a channel
/// lock held.
pub trait ChannelCallback: Send + Sync {
    /// An empty input buffer is ready to be filled.
    fn on_input_buffer_available(&self, index: usize, buffer: ClientBuffer);

    /// An output buffer is ready to be read.
    fn on_output_buffer_available(&self, index: usize, buffer: ClientBuffer);

    /// Something went wrong.
    fn on_error(&self, error: &Error, action: ErrorAction);
}

/// A channel notification as a value.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// See [`ChannelCallback::on_input_buffer_available`].
    InputAvailable {
        /// Slot index.
        index: usize,
        /// The buffer.
        buffer: ClientBuffer,
    },
    /// See [`ChannelCallback::on_output_buffer_available`].
    OutputAvailable {
        /// Slot index.
        index: usize,
        /// The buffer.
        buffer: ClientBuffer,
    },
    /// See [`ChannelCallback::on_error`].
    Error {
        /// The error.
        error: Error,
        /// Required reaction.
        action: ErrorAction,
    },
}

/// Callback that forwards notifications to an [`EventReceiver`].
#[derive(Clone)]
pub struct EventQueue {
    inner: kanal::Sender<ChannelEvent>,
}

impl EventQueue {
    /// Create an unbounded queue.
    ///
    /// The channel never blocks on the client, so the queue has no bound.
    pub fn unbounded() -> (EventQueue, EventReceiver) {
        let (tx, rx) = kanal::unbounded();
        (EventQueue { inner: tx }, EventReceiver { inner: rx })
    }

    fn push(&self, event: ChannelEvent) {
        if self.inner.send(event).is_err() {
            tracing::debug!("event receiver dropped; notification lost");
        }
    }
}

impl ChannelCallback for EventQueue {
    fn on_input_buffer_available(&self, index: usize, buffer: ClientBuffer) {
        self.push(ChannelEvent::InputAvailable { index, buffer });
    }

    fn on_output_buffer_available(&self, index: usize, buffer: ClientBuffer) {
        self.push(ChannelEvent::OutputAvailable { index, buffer });
    }

    fn on_error(&self, error: &Error, action: ErrorAction) {
        self.push(ChannelEvent::Error {
            error: error.clone(),
            action,
        });
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.inner.len())
            .finish()
    }
}

/// Receiving end of an [`EventQueue`].
pub struct EventReceiver {
    inner: kanal::Receiver<ChannelEvent>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` once every queue handle is gone.
    pub fn recv(&self) -> Option<ChannelEvent> {
        self.inner.recv().ok()
    }

    /// Next event if one is waiting.
    pub fn try_recv(&self) -> Option<ChannelEvent> {
        self.inner.try_recv().ok().flatten()
    }

    /// Take every waiting event.
    pub fn drain(&self) -> Vec<ChannelEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Number of waiting events.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no event is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("pending", &self.inner.len())
            .finish()
    }
}
