//! Domain events: the typed [`Event`] trait and the append-only [`DomainEvent`] record.

pub mod event;
pub mod record;

pub use event::Event;
pub use record::{DomainEvent, EventRecordError};
