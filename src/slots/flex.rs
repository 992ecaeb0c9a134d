//! Slot table that grows on demand.

use crate::buffer::{ClientBuffer, EngineBuffer, WeakEngineBuffer};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct FlexEntry {
    pub(crate) client: Option<ClientBuffer>,
    pub(crate) engine: WeakEngineBuffer,
}

impl FlexEntry {
    fn is_available(&self) -> bool {
        self.client.is_none() && self.engine.is_expired()
    }
}

/// Open-ended slot table.
///
/// The scan in [`assign`](Self::assign) is linear; the table never grows
/// beyond the number of buffers in flight.
#[derive(Debug, Default)]
pub struct FlexSlots {
    entries: Vec<FlexEntry>,
}

impl FlexSlots {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `buffer` to the client through the first available slot,
    /// appending a slot if none is available.
    pub fn assign(&mut self, buffer: ClientBuffer) -> usize {
        if let Some(index) = self.entries.iter().position(FlexEntry::is_available) {
            self.entries[index].client = Some(buffer);
            return index;
        }
        self.entries.push(FlexEntry {
            client: Some(buffer),
            engine: WeakEngineBuffer::default(),
        });
        self.entries.len() - 1
    }

    /// Take `buffer` back from the client.
    ///
    /// Returns the engine form of the buffer; the slot stays busy until every
    /// clone of it is dropped. Buffers this table does not hold yield
    /// [`Error::UnknownBuffer`].
    pub fn release(&mut self, buffer: &ClientBuffer) -> Result<Option<EngineBuffer>> {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.client.as_ref().is_some_and(|c| c.ptr_eq(buffer)))
        else {
            tracing::debug!("no matching buffer found");
            return Err(Error::UnknownBuffer);
        };
        if let Some(client) = entry.client.take() {
            // The slot is freed even if the engine form cannot be built.
            let engine = client.take_engine_buffer();
            entry.engine = engine
                .as_ref()
                .ok()
                .and_then(Option::as_ref)
                .map(EngineBuffer::downgrade)
                .unwrap_or_default();
            return engine;
        }
        Ok(None)
    }

    /// Forget every buffer the client holds.
    ///
    /// Weak references are kept so slots still in use by the engine stay busy.
    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            entry.client = None;
        }
    }

    /// Index of the slot holding `buffer`.
    pub fn index_of(&self, buffer: &ClientBuffer) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.client.as_ref().is_some_and(|c| c.ptr_eq(buffer)))
    }

    /// Client buffer in slot `index`, if the client holds it.
    pub fn client(&self, index: usize) -> Option<&ClientBuffer> {
        self.entries.get(index)?.client.as_ref()
    }

    /// Returns true if slot `index` exists and can be assigned.
    pub fn is_available(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(FlexEntry::is_available)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no slot was ever assigned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[FlexEntry] {
        &self.entries
    }
}
