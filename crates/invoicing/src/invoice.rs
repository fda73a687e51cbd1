use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use payremind_core::{
    ClientId, DomainResult, Identity, InvoiceId, TransitionError, ValidationError,
};
use payremind_events::Event;

use crate::number::InvoiceNumber;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Invoices younger than this (in milliseconds) at validation time are treated
/// as new and must fall due in the future.
const NEW_INVOICE_AGE_MS: i64 = 1000;

/// Invoice status lifecycle.
///
/// `Pending` is the initial state. `Paid` and `Cancelled` are terminal.
/// `Overdue` still accepts payment or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// Persisted shape of an invoice, used to rehydrate it from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub client_id: ClientId,
    pub number: InvoiceNumber,
    pub description: String,
    pub amount: Decimal,
    pub due_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: InvoiceStatus,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    identity: Identity<InvoiceId>,
    client_id: ClientId,
    number: InvoiceNumber,
    description: String,
    amount: Decimal,
    due_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    status: InvoiceStatus,
    reminder_sent: bool,
}

impl Invoice {
    /// Issue a new pending invoice. `due_at` must be after `now`.
    pub fn issue(
        client_id: ClientId,
        amount: Decimal,
        due_at: DateTime<Utc>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, InvoiceEvent)> {
        Self::issue_with_rng(client_id, amount, due_at, description, now, &mut rand::rng())
    }

    /// Same as [`Invoice::issue`] with a caller-supplied source for the
    /// number suffix.
    pub fn issue_with_rng<R: Rng>(
        client_id: ClientId,
        amount: Decimal,
        due_at: DateTime<Utc>,
        description: impl Into<String>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DomainResult<(Self, InvoiceEvent)> {
        let invoice = Self {
            identity: Identity::new(InvoiceId::new(), now),
            client_id,
            number: InvoiceNumber::generate(now, rng),
            description: description.into(),
            amount,
            due_at,
            paid_at: None,
            status: InvoiceStatus::Pending,
            reminder_sent: false,
        };
        invoice.validate(now)?;

        let event = InvoiceEvent::InvoiceIssued(InvoiceIssued {
            invoice_id: invoice.id(),
            client_id,
            number: invoice.number.clone(),
            description: invoice.description.clone(),
            amount,
            due_at,
            occurred_at: now,
        });
        Ok((invoice, event))
    }

    /// Rehydrate an invoice loaded from storage.
    ///
    /// Stored invoices may already be past due, so only the amount and the
    /// timestamp ordering are checked.
    pub fn restore(record: InvoiceRecord) -> DomainResult<Self> {
        if record.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount.into());
        }
        Ok(Self {
            identity: Identity::restore(record.id, record.created_at, record.updated_at)?,
            client_id: record.client_id,
            number: record.number,
            description: record.description,
            amount: record.amount,
            due_at: record.due_at,
            paid_at: record.paid_at,
            status: record.status,
            reminder_sent: record.reminder_sent,
        })
    }

    /// Check the invoice invariants as of `now`.
    ///
    /// The due date is only enforced while the invoice is less than a second
    /// old, i.e. while it is being created.
    pub fn validate(&self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount.into());
        }

        let is_new = (now - self.identity.created_at()).num_milliseconds() < NEW_INVOICE_AGE_MS;
        if is_new && self.due_at <= now {
            return Err(ValidationError::DueDateInPast.into());
        }

        Ok(())
    }

    pub fn id(&self) -> InvoiceId {
        self.identity.id()
    }

    pub fn identity(&self) -> &Identity<InvoiceId> {
        &self.identity
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn number(&self) -> &InvoiceNumber {
        &self.number
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn reminder_sent(&self) -> bool {
        self.reminder_sent
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at < now
    }

    /// Whole days until the due date, rounded down; negative once overdue.
    pub fn days_until_due(&self, now: DateTime<Utc>) -> i64 {
        (self.due_at - now).num_milliseconds().div_euclid(MILLIS_PER_DAY)
    }

    /// Whether a reminder should go out at `now`, given a lead time of
    /// `days_before` days.
    ///
    /// Only pending invoices without a reminder qualify, and only strictly
    /// inside `(due_at - days_before, due_at)`. Read-only.
    pub fn should_send_reminder(&self, days_before: u32, now: DateTime<Utc>) -> bool {
        if self.status != InvoiceStatus::Pending || self.reminder_sent {
            return false;
        }

        // A lead time past chrono's date range never opens.
        let Some(window_start) = Duration::try_days(i64::from(days_before))
            .and_then(|lead| self.due_at.checked_sub_signed(lead))
        else {
            return false;
        };
        now > window_start && now < self.due_at
    }

    /// Pending or Overdue -> Paid.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> DomainResult<InvoiceEvent> {
        match self.status {
            InvoiceStatus::Paid => return Err(TransitionError::AlreadyPaid.into()),
            InvoiceStatus::Cancelled => return Err(TransitionError::CannotPayCancelled.into()),
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
        }

        let previous_status = self.status;
        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(now);
        self.identity.touch(now);

        Ok(InvoiceEvent::InvoicePaid(InvoicePaid {
            invoice_id: self.id(),
            previous_status,
            paid_at: now,
        }))
    }

    /// Pending -> Overdue once the due date has passed.
    ///
    /// Returns `None` (and changes nothing) in every other case.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Option<InvoiceEvent> {
        if self.status != InvoiceStatus::Pending || !self.is_past_due(now) {
            return None;
        }

        self.status = InvoiceStatus::Overdue;
        self.identity.touch(now);

        Some(InvoiceEvent::InvoiceMarkedOverdue(InvoiceMarkedOverdue {
            invoice_id: self.id(),
            due_at: self.due_at,
            occurred_at: now,
        }))
    }

    /// Pending or Overdue -> Cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<InvoiceEvent> {
        match self.status {
            InvoiceStatus::Paid => return Err(TransitionError::CannotCancelPaid.into()),
            InvoiceStatus::Cancelled => return Err(TransitionError::AlreadyCancelled.into()),
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
        }

        let previous_status = self.status;
        self.status = InvoiceStatus::Cancelled;
        self.identity.touch(now);

        Ok(InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            invoice_id: self.id(),
            previous_status,
            occurred_at: now,
        }))
    }

    /// Record that the reminder was delivered.
    ///
    /// Call right after a confirmed send, and persist it together with that
    /// outcome, to keep reminders at most once per invoice.
    pub fn mark_reminder_sent(&mut self, now: DateTime<Utc>) -> InvoiceEvent {
        self.reminder_sent = true;
        self.identity.touch(now);

        InvoiceEvent::ReminderMarkedSent(ReminderMarkedSent {
            invoice_id: self.id(),
            occurred_at: now,
        })
    }
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub number: InvoiceNumber,
    pub description: String,
    pub amount: Decimal,
    pub due_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice_id: InvoiceId,
    pub previous_status: InvoiceStatus,
    pub paid_at: DateTime<Utc>,
}

/// Event: InvoiceMarkedOverdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMarkedOverdue {
    pub invoice_id: InvoiceId,
    pub due_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub invoice_id: InvoiceId,
    pub previous_status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReminderMarkedSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderMarkedSent {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoicePaid(InvoicePaid),
    InvoiceMarkedOverdue(InvoiceMarkedOverdue),
    InvoiceCancelled(InvoiceCancelled),
    ReminderMarkedSent(ReminderMarkedSent),
}

impl InvoiceEvent {
    pub fn invoice_id(&self) -> InvoiceId {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.invoice_id,
            InvoiceEvent::InvoicePaid(e) => e.invoice_id,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.invoice_id,
            InvoiceEvent::InvoiceCancelled(e) => e.invoice_id,
            InvoiceEvent::ReminderMarkedSent(e) => e.invoice_id,
        }
    }
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::InvoicePaid(_) => "invoicing.invoice.paid",
            InvoiceEvent::InvoiceMarkedOverdue(_) => "invoicing.invoice.overdue",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
            InvoiceEvent::ReminderMarkedSent(_) => "invoicing.invoice.reminder_sent",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.paid_at,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
            InvoiceEvent::ReminderMarkedSent(e) => e.occurred_at,
        }
    }

    fn aggregate_type(&self) -> &'static str {
        "invoice"
    }

    fn aggregate_id(&self) -> String {
        self.invoice_id().to_string()
    }
}
