//! Notifications domain module.
//!
//! Delivery and retry bookkeeping for one outbound message tied to an invoice.
//! Sending itself happens elsewhere; this crate only records outcomes.

pub mod notification;

pub use notification::{
    MAX_DELIVERY_ATTEMPTS, Notification, NotificationEvent, NotificationFailed, NotificationKind,
    NotificationQueued, NotificationRecord, NotificationSent, NotificationStatus,
};
