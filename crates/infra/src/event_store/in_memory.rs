use std::collections::HashSet;
use std::sync::RwLock;

use payremind_core::EventId;
use payremind_events::DomainEvent;

use super::r#trait::{EventStore, EventStoreError};

#[derive(Debug, Default)]
struct Log {
    events: Vec<DomainEvent>,
    ids: HashSet<EventId>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored event, in append order.
    pub fn events(&self) -> Vec<DomainEvent> {
        match self.log.read() {
            Ok(log) => log.events.clone(),
            Err(_) => vec![],
        }
    }

    /// Stored events for one aggregate, in append order.
    pub fn events_for(&self, aggregate_id: &str) -> Vec<DomainEvent> {
        let log = match self.log.read() {
            Ok(log) => log,
            Err(_) => return vec![],
        };
        log.events
            .iter()
            .filter(|e| e.aggregate_id() == aggregate_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn save(&self, event: &DomainEvent) -> Result<(), EventStoreError> {
        let mut log = self
            .log
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        if !log.ids.insert(event.id()) {
            return Err(EventStoreError::Duplicate(event.id()));
        }
        log.events.push(event.clone());
        Ok(())
    }
}
