use chrono::{DateTime, Utc};

/// A typed domain event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "invoicing.invoice.paid").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Kind of aggregate the event belongs to (e.g. "invoice").
    fn aggregate_type(&self) -> &'static str;

    /// Identifier of the aggregate instance, rendered as a string.
    fn aggregate_id(&self) -> String;
}
