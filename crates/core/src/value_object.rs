//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attributes are interchangeable. Examples in this workspace are
/// the time of day bounding a send window and an invoice's display number.
///
/// Entities (clients, invoices, notifications) are the opposite: they carry an
/// [`Identity`](crate::Identity) and stay the same entity as their attributes
/// change.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
