//! Append-only domain event store boundary.
//!
//! Records produced by the entities are written here after the entity change
//! they describe has been persisted. Nothing is ever updated or removed.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError};
