use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use payremind_core::EventId;

use crate::Event;

/// Immutable, append-only record of a state change.
///
/// This is the unit handed to the event store. It carries enough metadata to be
/// interpreted without the typed event definitions:
/// - `event_type` + `version` identify the payload schema
/// - `aggregate_type` + `aggregate_id` identify the stream
/// - `metadata` is always a JSON value, never null (absent metadata becomes `{}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    id: EventId,
    event_type: String,
    aggregate_id: String,
    aggregate_type: String,
    payload: JsonValue,
    #[serde(default = "empty_metadata", deserialize_with = "deserialize_metadata")]
    metadata: JsonValue,
    timestamp: DateTime<Utc>,
    version: u32,
}

/// Failure to turn a typed event into a [`DomainEvent`].
#[derive(Debug, Error)]
pub enum EventRecordError {
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

impl DomainEvent {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
        metadata: Option<JsonValue>,
        version: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            payload,
            metadata: normalize_metadata(metadata),
            timestamp: now,
            version,
        }
    }

    /// Build a record from a typed domain event.
    ///
    /// The event is serialized as the payload; type name, schema version,
    /// aggregate and business timestamp come from the [`Event`] impl.
    pub fn from_typed<E>(event: &E, metadata: Option<JsonValue>) -> Result<Self, EventRecordError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            event.event_type(),
            event.aggregate_id(),
            event.aggregate_type(),
            payload,
            metadata,
            event.version(),
            event.occurred_at(),
        ))
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn metadata(&self) -> &JsonValue {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

fn empty_metadata() -> JsonValue {
    JsonValue::Object(Map::new())
}

fn normalize_metadata(metadata: Option<JsonValue>) -> JsonValue {
    match metadata {
        None | Some(JsonValue::Null) => empty_metadata(),
        Some(value) => value,
    }
}

fn deserialize_metadata<'de, D>(deserializer: D) -> Result<JsonValue, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(normalize_metadata(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize)]
    struct Pinged {
        target: String,
        at: DateTime<Utc>,
    }

    impl Event for Pinged {
        fn event_type(&self) -> &'static str {
            "tests.target.pinged"
        }

        fn version(&self) -> u32 {
            2
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }

        fn aggregate_type(&self) -> &'static str {
            "target"
        }

        fn aggregate_id(&self) -> String {
            self.target.clone()
        }
    }

    #[test]
    fn missing_metadata_is_normalized_to_empty_object() {
        let event = DomainEvent::new(
            "invoicing.invoice.paid",
            "abc",
            "invoice",
            json!({"amount": "10.00"}),
            None,
            1,
            Utc::now(),
        );
        assert_eq!(event.metadata(), &json!({}));
        assert!(event.metadata().is_object());
    }

    #[test]
    fn null_metadata_is_normalized_to_empty_object() {
        let event = DomainEvent::new("x", "y", "z", json!({}), Some(JsonValue::Null), 1, Utc::now());
        assert_eq!(event.metadata(), &json!({}));
    }

    #[test]
    fn provided_metadata_is_kept() {
        let event = DomainEvent::new(
            "x",
            "y",
            "z",
            json!({}),
            Some(json!({"correlation_id": "c-1"})),
            1,
            Utc::now(),
        );
        assert_eq!(event.metadata()["correlation_id"], "c-1");
    }

    #[test]
    fn read_back_never_yields_null_metadata() {
        let event = DomainEvent::new("x", "y", "z", json!({"k": 1}), None, 1, Utc::now());
        let mut stored = serde_json::to_value(&event).unwrap();

        let back: DomainEvent = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(back, event);

        // Rows written by older producers may carry null or no metadata at all.
        stored["metadata"] = JsonValue::Null;
        let back: DomainEvent = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(back.metadata(), &json!({}));

        stored.as_object_mut().unwrap().remove("metadata");
        let back: DomainEvent = serde_json::from_value(stored).unwrap();
        assert_eq!(back.metadata(), &json!({}));
    }

    #[test]
    fn from_typed_copies_event_metadata() {
        let at = Utc::now();
        let typed = Pinged {
            target: "t-1".to_string(),
            at,
        };

        let record = DomainEvent::from_typed(&typed, None).unwrap();
        assert_eq!(record.event_type(), "tests.target.pinged");
        assert_eq!(record.aggregate_type(), "target");
        assert_eq!(record.aggregate_id(), "t-1");
        assert_eq!(record.version(), 2);
        assert_eq!(record.timestamp(), at);
        assert_eq!(record.payload()["target"], "t-1");
        assert_eq!(record.metadata(), &json!({}));
    }

    #[test]
    fn each_record_gets_its_own_id() {
        let a = DomainEvent::new("x", "y", "z", json!({}), None, 1, Utc::now());
        let b = DomainEvent::new("x", "y", "z", json!({}), None, 1, Utc::now());
        assert_ne!(a.id(), b.id());
    }
}
