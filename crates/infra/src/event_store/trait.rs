use std::sync::Arc;

use thiserror::Error;

use payremind_core::EventId;
use payremind_events::DomainEvent;

/// Event store operation error.
///
/// These are infrastructure errors, as opposed to domain errors (validation,
/// transitions).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An event with the same id is already stored.
    #[error("event {0} already appended")]
    Duplicate(EventId),

    #[error("event store backend failure: {0}")]
    Backend(String),
}

/// Append-only event store.
///
/// Implementations must keep events in append order and reject a second
/// append of the same event id. There is no update or delete.
pub trait EventStore: Send + Sync {
    fn save(&self, event: &DomainEvent) -> Result<(), EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn save(&self, event: &DomainEvent) -> Result<(), EventStoreError> {
        (**self).save(event)
    }
}
