//! Slot tables tracking which buffers the client and the engine hold.
//!
//! A slot pairs a client-visible buffer with a weak reference to the engine
//! form derived from it. A slot is reusable only when the client has let go
//! of it **and** the weak reference has expired, so memory the engine may
//! still be reading through an alias is never handed out again.
//!
//! - [`FlexSlots`]: grows on demand; used until the client asks for a fixed set
//! - [`ArraySlots`]: fixed set of pre-enumerated buffers built from a [`FlexSlots`]
//!
//! # Example
//!
//! ```rust,ignore
//! use slotline::slots::FlexSlots;
//!
//! let mut slots = FlexSlots::new();
//! let index = slots.assign(buffer.clone());
//!
//! // Client hands the buffer back; the engine form keeps the slot busy.
//! let engine = slots.release(&buffer)?;
//! drop(engine);
//! assert!(slots.is_available(index));
//! ```

mod array;
mod flex;

pub use array::ArraySlots;
pub use flex::FlexSlots;
