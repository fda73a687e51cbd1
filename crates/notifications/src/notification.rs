use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use payremind_core::{
    ClientId, DomainResult, Identity, InvoiceId, NotificationId, ValidationError,
};
use payremind_events::Event;

/// Delivery attempts allowed before a message is dead-lettered.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// What the message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Heads-up before the due date.
    Reminder,
    /// Payment received.
    Confirmation,
    /// Collection notice for an overdue invoice.
    Billing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

/// Persisted shape of a notification, used to rehydrate it from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub destination: String,
    pub kind: NotificationKind,
    pub body: String,
    pub status: NotificationStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity: one outbound message and its delivery history.
///
/// `attempt_count` counts every recorded outcome, successful or not, and never
/// decreases. Dead-lettering is derived from it rather than stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    identity: Identity<NotificationId>,
    invoice_id: InvoiceId,
    client_id: ClientId,
    destination: String,
    kind: NotificationKind,
    body: String,
    status: NotificationStatus,
    attempt_count: u32,
    last_error: Option<String>,
    sent_at: Option<DateTime<Utc>>,
}

fn validate_message(destination: &str, body: &str) -> Result<(), ValidationError> {
    if destination.is_empty() {
        return Err(ValidationError::EmptyDestination);
    }
    if body.is_empty() {
        return Err(ValidationError::EmptyBody);
    }
    Ok(())
}

impl Notification {
    /// New pending message with no attempts yet.
    pub fn queue(
        invoice_id: InvoiceId,
        client_id: ClientId,
        destination: impl Into<String>,
        body: impl Into<String>,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, NotificationEvent)> {
        let destination = destination.into();
        let body = body.into();
        validate_message(&destination, &body)?;

        let notification = Self {
            identity: Identity::new(NotificationId::new(), now),
            invoice_id,
            client_id,
            destination,
            kind,
            body,
            status: NotificationStatus::Pending,
            attempt_count: 0,
            last_error: None,
            sent_at: None,
        };

        let event = NotificationEvent::NotificationQueued(NotificationQueued {
            notification_id: notification.id(),
            invoice_id,
            client_id,
            kind,
            occurred_at: now,
        });
        Ok((notification, event))
    }

    /// Rehydrate a notification loaded from storage.
    pub fn restore(record: NotificationRecord) -> DomainResult<Self> {
        validate_message(&record.destination, &record.body)?;
        Ok(Self {
            identity: Identity::restore(record.id, record.created_at, record.updated_at)?,
            invoice_id: record.invoice_id,
            client_id: record.client_id,
            destination: record.destination,
            kind: record.kind,
            body: record.body,
            status: record.status,
            attempt_count: record.attempt_count,
            last_error: record.last_error,
            sent_at: record.sent_at,
        })
    }

    pub fn id(&self) -> NotificationId {
        self.identity.id()
    }

    pub fn identity(&self) -> &Identity<NotificationId> {
        &self.identity
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn status(&self) -> NotificationStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    /// Record a successful delivery. Callable from any state; a repeat call
    /// re-stamps `sent_at` and counts another attempt.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> NotificationEvent {
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(now);
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.identity.touch(now);

        NotificationEvent::NotificationSent(NotificationSent {
            notification_id: self.id(),
            attempt_count: self.attempt_count,
            sent_at: now,
        })
    }

    /// Record a failed delivery attempt.
    pub fn mark_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> NotificationEvent {
        let reason = reason.into();
        self.status = NotificationStatus::Failed;
        self.last_error = Some(reason.clone());
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.identity.touch(now);

        NotificationEvent::NotificationFailed(NotificationFailed {
            notification_id: self.id(),
            attempt_count: self.attempt_count,
            reason,
            dead_lettered: self.is_dead_lettered(),
            occurred_at: now,
        })
    }

    pub fn can_retry(&self) -> bool {
        self.attempt_count < MAX_DELIVERY_ATTEMPTS
    }

    /// Out of attempts without ever being delivered.
    pub fn is_dead_lettered(&self) -> bool {
        self.attempt_count >= MAX_DELIVERY_ATTEMPTS && self.status != NotificationStatus::Sent
    }
}

/// Event: NotificationQueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationQueued {
    pub notification_id: NotificationId,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub kind: NotificationKind,
    pub occurred_at: DateTime<Utc>,
}

/// Event: NotificationSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSent {
    pub notification_id: NotificationId,
    pub attempt_count: u32,
    pub sent_at: DateTime<Utc>,
}

/// Event: NotificationFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFailed {
    pub notification_id: NotificationId,
    pub attempt_count: u32,
    pub reason: String,
    pub dead_lettered: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    NotificationQueued(NotificationQueued),
    NotificationSent(NotificationSent),
    NotificationFailed(NotificationFailed),
}

impl NotificationEvent {
    pub fn notification_id(&self) -> NotificationId {
        match self {
            NotificationEvent::NotificationQueued(e) => e.notification_id,
            NotificationEvent::NotificationSent(e) => e.notification_id,
            NotificationEvent::NotificationFailed(e) => e.notification_id,
        }
    }
}

impl Event for NotificationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::NotificationQueued(_) => "notifications.notification.queued",
            NotificationEvent::NotificationSent(_) => "notifications.notification.sent",
            NotificationEvent::NotificationFailed(_) => "notifications.notification.failed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            NotificationEvent::NotificationQueued(e) => e.occurred_at,
            NotificationEvent::NotificationSent(e) => e.sent_at,
            NotificationEvent::NotificationFailed(e) => e.occurred_at,
        }
    }

    fn aggregate_type(&self) -> &'static str {
        "notification"
    }

    fn aggregate_id(&self) -> String {
        self.notification_id().to_string()
    }
}
