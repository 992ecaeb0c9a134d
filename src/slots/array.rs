//! Fixed-size slot table.

use super::FlexSlots;
use crate::buffer::{ClientBuffer, EngineBuffer, WeakEngineBuffer};
use crate::error::{Error, Result};

#[derive(Debug)]
struct ArrayEntry {
    client: ClientBuffer,
    engine: WeakEngineBuffer,
    owned: bool,
}

/// Slot table with a fixed, enumerable set of buffers.
///
/// Built once from a [`FlexSlots`]; the buffers are reused for the lifetime
/// of the table.
#[derive(Debug, Default)]
pub struct ArraySlots {
    entries: Vec<ArrayEntry>,
}

impl ArraySlots {
    /// Build a table from `flex`, padding it to at least `min_size` slots.
    ///
    /// Slots the client holds keep their buffer and stay owned. Free slots
    /// get a buffer from `allocate` and keep their weak reference. Padding
    /// stops early with a warning if `allocate` fails once at least one slot
    /// exists.
    pub fn initialize(
        flex: &FlexSlots,
        min_size: usize,
        mut allocate: impl FnMut() -> Result<ClientBuffer>,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(flex.len().max(min_size));
        for entry in flex.entries() {
            let (client, owned) = match &entry.client {
                Some(client) => (client.clone(), true),
                None => (allocate()?, false),
            };
            entries.push(ArrayEntry {
                client,
                engine: entry.engine.clone(),
                owned,
            });
        }
        while entries.len() < min_size {
            match allocate() {
                Ok(client) => entries.push(ArrayEntry {
                    client,
                    engine: WeakEngineBuffer::default(),
                    owned: false,
                }),
                Err(err) if !entries.is_empty() => {
                    tracing::warn!(
                        slots = entries.len(),
                        min_size,
                        error = %err,
                        "stopped padding buffer array"
                    );
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        if entries.is_empty() {
            return Err(Error::AllocationFailed("buffer array is empty".into()));
        }
        Ok(Self { entries })
    }

    /// Hand out the first free slot whose buffer satisfies `matches`.
    ///
    /// The buffer's range is reset to its full capacity and its metadata is
    /// cleared. Returns [`Error::NoSlotAvailable`] when nothing matches.
    pub fn grab(
        &mut self,
        mut matches: impl FnMut(&ClientBuffer) -> bool,
    ) -> Result<(usize, ClientBuffer)> {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if !entry.owned && entry.engine.is_expired() && matches(&entry.client) {
                entry.owned = true;
                entry.client.reset();
                return Ok((index, entry.client.clone()));
            }
        }
        Err(Error::NoSlotAvailable)
    }

    /// Take `buffer` back from the client.
    ///
    /// Returning a buffer the table does not consider owned is logged and
    /// otherwise accepted. Foreign buffers yield [`Error::UnknownBuffer`].
    pub fn return_buffer(&mut self, buffer: &ClientBuffer) -> Result<Option<EngineBuffer>> {
        let Some((index, entry)) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.client.ptr_eq(buffer))
        else {
            tracing::debug!("no matching buffer found");
            return Err(Error::UnknownBuffer);
        };
        if !entry.owned {
            tracing::debug!(index, "client returned a buffer it does not own");
        }
        entry.owned = false;
        let engine = entry.client.take_engine_buffer();
        entry.engine = engine
            .as_ref()
            .ok()
            .and_then(Option::as_ref)
            .map(EngineBuffer::downgrade)
            .unwrap_or_default();
        engine
    }

    /// The client abandoned every buffer; reclaim ownership of all slots.
    ///
    /// Weak references are kept so slots still in use by the engine stay busy.
    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            entry.owned = false;
        }
    }

    /// Snapshot of the buffers, in slot order.
    pub fn buffers(&self) -> Vec<ClientBuffer> {
        self.entries.iter().map(|e| e.client.clone()).collect()
    }

    /// Returns true if any slot's buffer satisfies `matches`, owned or not.
    pub fn any(&self, mut matches: impl FnMut(&ClientBuffer) -> bool) -> bool {
        self.entries.iter().any(|e| matches(&e.client))
    }

    /// Returns true if slot `index` is held by the client.
    pub fn is_owned(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| e.owned)
    }

    /// Buffer in slot `index`.
    pub fn client(&self, index: usize) -> Option<&ClientBuffer> {
        self.entries.get(index).map(|e| &e.client)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no slot.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MediaFormat;
    use crate::memory::LinearBlock;
    use crate::metadata::Metadata;
    use std::sync::Arc;

    fn buffer() -> ClientBuffer {
        ClientBuffer::linear(Arc::new(MediaFormat::default()), LinearBlock::heap(8))
    }

    fn allocate() -> Result<ClientBuffer> {
        Ok(buffer())
    }

    #[test]
    fn test_initialize_preserves_client_ownership() {
        let mut flex = FlexSlots::new();
        let held = buffer();
        let returned = buffer();
        flex.assign(returned.clone());
        flex.assign(held.clone());
        let _engine = flex.release(&returned).unwrap();

        let array = ArraySlots::initialize(&flex, 4, allocate).unwrap();
        assert_eq!(array.len(), 4);
        assert!(array.is_owned(1));
        assert!(array.client(1).unwrap().ptr_eq(&held));
        assert!(!array.is_owned(0));
        assert!(!array.client(0).unwrap().ptr_eq(&returned));
    }

    #[test]
    fn test_initialize_keeps_weak_references() {
        let mut flex = FlexSlots::new();
        let a = buffer();
        flex.assign(a.clone());
        let engine = flex.release(&a).unwrap();

        let mut array = ArraySlots::initialize(&flex, 1, allocate).unwrap();
        assert_eq!(array.grab(|_| true).unwrap_err(), Error::NoSlotAvailable);
        drop(engine);
        assert_eq!(array.grab(|_| true).unwrap().0, 0);
    }

    #[test]
    fn test_grab_resets_buffer() {
        let mut array = ArraySlots::initialize(&FlexSlots::new(), 2, allocate).unwrap();
        let (index, buffer) = array.grab(|_| true).unwrap();
        buffer.set_range(2, 3).unwrap();
        buffer.set_metadata(Metadata::new().with_eos());
        drop(array.return_buffer(&buffer).unwrap());

        let (again, buffer) = array.grab(|_| true).unwrap();
        assert_eq!(again, index);
        assert_eq!((buffer.offset(), buffer.size()), (0, 8));
        assert!(!buffer.metadata().flags.eos);
    }

    #[test]
    fn test_grab_respects_predicate() {
        let mut array = ArraySlots::initialize(&FlexSlots::new(), 3, allocate).unwrap();
        let second = array.client(1).unwrap().clone();
        let (index, _) = array.grab(|b| b.ptr_eq(&second)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(
            array.grab(|b| b.ptr_eq(&second)).unwrap_err(),
            Error::NoSlotAvailable
        );
    }

    #[test]
    fn test_exhaustion_is_backpressure() {
        let mut array = ArraySlots::initialize(&FlexSlots::new(), 2, allocate).unwrap();
        array.grab(|_| true).unwrap();
        array.grab(|_| true).unwrap();
        let err = array.grab(|_| true).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_return_unowned_is_tolerated() {
        let mut array = ArraySlots::initialize(&FlexSlots::new(), 1, allocate).unwrap();
        let buffer = array.client(0).unwrap().clone();
        assert!(array.return_buffer(&buffer).is_ok());
        assert_eq!(
            array.return_buffer(&self::buffer()).unwrap_err(),
            Error::UnknownBuffer
        );
    }

    #[test]
    fn test_flush_reclaims_ownership() {
        let mut array = ArraySlots::initialize(&FlexSlots::new(), 2, allocate).unwrap();
        array.grab(|_| true).unwrap();
        array.grab(|_| true).unwrap();

        array.flush();
        assert!(!array.is_owned(0));
        assert!(!array.is_owned(1));
        assert!(array.grab(|_| true).is_ok());
    }

    #[test]
    fn test_padding_stops_on_failure() {
        let mut left = 2;
        let array = ArraySlots::initialize(&FlexSlots::new(), 16, || {
            if left == 0 {
                return Err(Error::PoolExhausted);
            }
            left -= 1;
            Ok(buffer())
        })
        .unwrap();
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn test_empty_array_is_an_error() {
        let err = ArraySlots::initialize(&FlexSlots::new(), 4, || Err(Error::PoolExhausted))
            .unwrap_err();
        assert_eq!(err, Error::PoolExhausted);

        let err = ArraySlots::initialize(&FlexSlots::new(), 0, allocate).unwrap_err();
        assert!(matches!(err, Error::AllocationFailed(_)));
    }

    #[test]
    fn test_buffers_snapshot() {
        let array = ArraySlots::initialize(&FlexSlots::new(), 3, allocate).unwrap();
        let buffers = array.buffers();
        assert_eq!(buffers.len(), 3);
        assert!(buffers[2].ptr_eq(array.client(2).unwrap()));
    }
}
