//! Reminder dispatch: selects invoices, renders messages, delivers them and
//! records every outcome.
//!
//! ## Flow for one message
//!
//! ```text
//! load invoice + client + configuration
//!   ↓
//! render body from the owner's template
//!   ↓
//! queue Notification (persist + event)
//!   ↓
//! OutboundChannel::deliver
//!   ↓
//! mark_sent / mark_failed (persist + event)
//!   ↓
//! on success: invoice bookkeeping (persist + event)
//! ```
//!
//! Entity changes are persisted before their events are appended. Channel
//! failures are outcomes, not errors; only storage and domain failures abort
//! an operation. There is no timing loop here: callers decide when to invoke
//! [`ReminderDispatcher::run_once`] and [`ReminderDispatcher::retry_failed`].

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use payremind_clients::Client;
use payremind_core::{ClientId, DomainError, InvoiceId, NotificationId};
use payremind_events::{DomainEvent, Event, EventRecordError};
use payremind_invoicing::{Invoice, InvoiceStatus};
use payremind_notifications::{Notification, NotificationKind, NotificationStatus};
use payremind_reminders::{
    DEFAULT_CONFIRMATION_TEMPLATE, ReminderConfiguration, TemplateContext, render,
};

use crate::channel::OutboundChannel;
use crate::event_store::{EventStore, EventStoreError};
use crate::repository::{
    ClientRepository, ConfigurationRepository, InvoiceRepository, NotificationRepository,
    StoreError,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),

    #[error("client {0} not found")]
    ClientNotFound(ClientId),

    #[error("no reminder configuration for owner {0}")]
    ConfigurationNotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    EventRecord(#[from] EventRecordError),
}

/// Why a message was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ClientInactive,
    /// The invoice is not in a state this message applies to.
    NotEligible,
    AutoSendDisabled,
    /// An earlier reminder for the invoice is still awaiting retry, or was
    /// dead-lettered.
    AlreadyQueued,
}

/// Result of one delivery attempt (or the decision not to attempt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(NotificationId),
    Failed {
        notification_id: NotificationId,
        reason: String,
    },
    Skipped(SkipReason),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SendOutcome::Failed { .. })
    }
}

/// What one [`ReminderDispatcher::run_once`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub marked_overdue: Vec<InvoiceId>,
    pub billing_notices: Vec<(InvoiceId, SendOutcome)>,
    pub reminders: Vec<(InvoiceId, SendOutcome)>,
    /// Sending was not allowed at this moment (no configuration, auto-send
    /// off, or outside the window). The overdue sweep still ran.
    pub sending_suppressed: bool,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.outcomes().filter(|o| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes().filter(|o| o.is_failed()).count()
    }

    fn outcomes(&self) -> impl Iterator<Item = &SendOutcome> {
        self.billing_notices
            .iter()
            .chain(self.reminders.iter())
            .map(|(_, outcome)| outcome)
    }
}

/// What one [`ReminderDispatcher::retry_failed`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub sent: Vec<NotificationId>,
    pub failed: Vec<NotificationId>,
    /// Failed notifications with no attempts left; not retried.
    pub dead_lettered: Vec<NotificationId>,
    /// Failed notifications whose invoice moved on (paid, cancelled, already
    /// reminded); not retried.
    pub superseded: Vec<NotificationId>,
}

/// Storage collaborators of the dispatcher.
#[derive(Clone)]
pub struct Stores {
    pub clients: Arc<dyn ClientRepository>,
    pub configurations: Arc<dyn ConfigurationRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub events: Arc<dyn EventStore>,
}

pub struct ReminderDispatcher<C> {
    stores: Stores,
    channel: C,
}

impl<C> ReminderDispatcher<C> {
    pub fn new(stores: Stores, channel: C) -> Self {
        Self { stores, channel }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C> ReminderDispatcher<C>
where
    C: OutboundChannel,
{
    /// Pending invoices that should get a reminder for `owner_id` right now.
    ///
    /// Empty when the owner has no configuration, auto-send is off, or `now`
    /// (in its own time zone) is outside the send window.
    pub fn due_reminders<Tz: TimeZone>(
        &self,
        owner_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<Vec<Invoice>, DispatchError> {
        let Some(configuration) = self.stores.configurations.find_by_owner(owner_id)? else {
            return Ok(vec![]);
        };
        if !configuration.is_auto_send_allowed(now) {
            return Ok(vec![]);
        }

        let utc = now.with_timezone(&Utc);
        let days_before = configuration.days_before_reminder();
        Ok(self
            .stores
            .invoices
            .find_pending()?
            .into_iter()
            .filter(|invoice| invoice.should_send_reminder(days_before, utc))
            .collect())
    }

    /// Send the pre-due reminder for one invoice.
    ///
    /// The lead time and send window are not re-checked here; only invoices
    /// that are still pending and not yet reminded are eligible.
    pub fn send_reminder(
        &self,
        invoice_id: InvoiceId,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, DispatchError> {
        let configuration = self.configuration(owner_id)?;
        let mut invoice = self.invoice(invoice_id)?;
        if invoice.status() != InvoiceStatus::Pending || invoice.reminder_sent() {
            tracing::debug!(
                invoice_id = %invoice_id,
                status = invoice.status().as_str(),
                "reminder not applicable"
            );
            return Ok(SendOutcome::Skipped(SkipReason::NotEligible));
        }

        let unsent_earlier = self
            .stores
            .notifications
            .find_by_invoice(invoice_id)?
            .iter()
            .any(|n| {
                n.kind() == NotificationKind::Reminder && n.status() != NotificationStatus::Sent
            });
        if unsent_earlier {
            tracing::debug!(invoice_id = %invoice_id, "earlier reminder unsent, left to retry");
            return Ok(SendOutcome::Skipped(SkipReason::AlreadyQueued));
        }

        let client = self.client(invoice.client_id())?;
        if !client.is_active() {
            tracing::info!(
                invoice_id = %invoice_id,
                client_id = %client.id(),
                "client inactive, reminder skipped"
            );
            return Ok(SendOutcome::Skipped(SkipReason::ClientInactive));
        }

        let body = render_for(
            configuration.reminder_template(),
            &client,
            &invoice,
            &configuration,
            now,
        );
        let outcome = self.deliver_new(&invoice, &client, body, NotificationKind::Reminder, now)?;

        if outcome.is_sent() {
            self.mark_reminded(&mut invoice, now)?;
        }
        Ok(outcome)
    }

    /// Send the billing notice for an overdue invoice.
    pub fn send_billing_notice(
        &self,
        invoice_id: InvoiceId,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, DispatchError> {
        let configuration = self.configuration(owner_id)?;
        let invoice = self.invoice(invoice_id)?;
        if invoice.status() != InvoiceStatus::Overdue {
            return Ok(SendOutcome::Skipped(SkipReason::NotEligible));
        }

        let client = self.client(invoice.client_id())?;
        if !client.is_active() {
            return Ok(SendOutcome::Skipped(SkipReason::ClientInactive));
        }

        let body = render_for(
            configuration.billing_template(),
            &client,
            &invoice,
            &configuration,
            now,
        );
        self.deliver_new(&invoice, &client, body, NotificationKind::Billing, now)
    }

    /// Record a payment and thank the client.
    ///
    /// The invoice is marked paid even when the confirmation is skipped
    /// (inactive client, or the owner has auto-send switched off).
    pub fn confirm_payment(
        &self,
        invoice_id: InvoiceId,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, DispatchError> {
        let mut invoice = self.invoice(invoice_id)?;
        let paid = invoice.mark_paid(now)?;
        self.stores.invoices.update(&invoice)?;
        self.record(&paid)?;
        tracing::info!(invoice_id = %invoice_id, "invoice paid");

        let configuration = self.stores.configurations.find_by_owner(owner_id)?;
        if configuration.as_ref().is_some_and(|c| !c.auto_send_enabled()) {
            return Ok(SendOutcome::Skipped(SkipReason::AutoSendDisabled));
        }

        let client = self.client(invoice.client_id())?;
        if !client.is_active() {
            return Ok(SendOutcome::Skipped(SkipReason::ClientInactive));
        }

        let finance_contact = configuration
            .as_ref()
            .map(|c| c.finance_contact())
            .unwrap_or_default();
        let body = render(
            DEFAULT_CONFIRMATION_TEMPLATE,
            &context(&client, &invoice, finance_contact, now),
        );
        self.deliver_new(&invoice, &client, body, NotificationKind::Confirmation, now)
    }

    /// Redeliver failed notifications that still have attempts left and still
    /// apply to their invoice's current state.
    ///
    /// The send window is not consulted; retry cadence belongs to the caller.
    pub fn retry_failed(&self, now: DateTime<Utc>) -> Result<RetryReport, DispatchError> {
        let mut report = RetryReport::default();

        for mut notification in self.stores.notifications.find_by_status(NotificationStatus::Failed)? {
            if !notification.can_retry() {
                tracing::warn!(
                    notification_id = %notification.id(),
                    invoice_id = %notification.invoice_id(),
                    attempts = notification.attempt_count(),
                    last_error = notification.last_error().unwrap_or_default(),
                    "notification dead-lettered"
                );
                report.dead_lettered.push(notification.id());
                continue;
            }

            let kind = notification.kind();
            let Some(mut invoice) = self
                .stores
                .invoices
                .find_by_id(notification.invoice_id())?
                .filter(|invoice| still_applies(kind, invoice))
            else {
                tracing::info!(
                    notification_id = %notification.id(),
                    invoice_id = %notification.invoice_id(),
                    kind = ?kind,
                    "invoice moved on, retry dropped"
                );
                report.superseded.push(notification.id());
                continue;
            };

            match self.attempt(&mut notification, now)? {
                SendOutcome::Sent(id) => {
                    if kind == NotificationKind::Reminder {
                        self.mark_reminded(&mut invoice, now)?;
                    }
                    report.sent.push(id);
                }
                SendOutcome::Failed { notification_id, .. } => report.failed.push(notification_id),
                SendOutcome::Skipped(_) => {}
            }
        }

        Ok(report)
    }

    /// Move every pending invoice past its due instant to overdue.
    pub fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<InvoiceId>, DispatchError> {
        let mut marked = Vec::new();
        for mut invoice in self.stores.invoices.find_pending()? {
            if let Some(event) = invoice.mark_overdue(now) {
                self.stores.invoices.update(&invoice)?;
                self.record(&event)?;
                tracing::info!(invoice_id = %invoice.id(), number = %invoice.number(), "invoice overdue");
                marked.push(invoice.id());
            }
        }
        Ok(marked)
    }

    /// One scheduling pass for `owner_id`: sweep overdue invoices, then, if
    /// sending is allowed at `now`, send billing notices for the invoices that
    /// just became overdue and reminders for those coming due.
    pub fn run_once<Tz: TimeZone>(
        &self,
        owner_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<DispatchReport, DispatchError> {
        let utc = now.with_timezone(&Utc);
        let mut report = DispatchReport {
            marked_overdue: self.sweep_overdue(utc)?,
            ..DispatchReport::default()
        };

        let allowed = self
            .stores
            .configurations
            .find_by_owner(owner_id)?
            .is_some_and(|c| c.is_auto_send_allowed(now));
        if !allowed {
            tracing::debug!(owner_id, "sending suppressed for this pass");
            report.sending_suppressed = true;
            return Ok(report);
        }

        for invoice_id in report.marked_overdue.clone() {
            let outcome = self.send_billing_notice(invoice_id, owner_id, utc)?;
            report.billing_notices.push((invoice_id, outcome));
        }
        for invoice in self.due_reminders(owner_id, now)? {
            let outcome = self.send_reminder(invoice.id(), owner_id, utc)?;
            report.reminders.push((invoice.id(), outcome));
        }

        tracing::info!(
            owner_id,
            overdue = report.marked_overdue.len(),
            sent = report.sent(),
            failed = report.failed(),
            "dispatch pass finished"
        );
        Ok(report)
    }

    fn deliver_new(
        &self,
        invoice: &Invoice,
        client: &Client,
        body: String,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, DispatchError> {
        let (mut notification, queued) = Notification::queue(
            invoice.id(),
            client.id(),
            client.contact_handle(),
            body,
            kind,
            now,
        )?;
        self.stores.notifications.save(&notification)?;
        self.record(&queued)?;

        self.attempt(&mut notification, now)
    }

    fn attempt(
        &self,
        notification: &mut Notification,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, DispatchError> {
        let (event, outcome) = match self
            .channel
            .deliver(notification.destination(), notification.body())
        {
            Ok(()) => {
                let event = notification.mark_sent(now);
                tracing::info!(
                    notification_id = %notification.id(),
                    invoice_id = %notification.invoice_id(),
                    kind = ?notification.kind(),
                    attempts = notification.attempt_count(),
                    "notification delivered"
                );
                (event, SendOutcome::Sent(notification.id()))
            }
            Err(err) => {
                let reason = format!("{err:#}");
                let event = notification.mark_failed(reason.clone(), now);
                tracing::warn!(
                    notification_id = %notification.id(),
                    invoice_id = %notification.invoice_id(),
                    kind = ?notification.kind(),
                    attempts = notification.attempt_count(),
                    error = %reason,
                    "notification delivery failed"
                );
                (
                    event,
                    SendOutcome::Failed {
                        notification_id: notification.id(),
                        reason,
                    },
                )
            }
        };

        self.stores.notifications.update(notification)?;
        self.record(&event)?;
        Ok(outcome)
    }

    fn mark_reminded(&self, invoice: &mut Invoice, now: DateTime<Utc>) -> Result<(), DispatchError> {
        let event = invoice.mark_reminder_sent(now);
        self.stores.invoices.update(invoice)?;
        self.record(&event)
    }

    fn record<E>(&self, event: &E) -> Result<(), DispatchError>
    where
        E: Event + Serialize,
    {
        let record = DomainEvent::from_typed(event, None)?;
        self.stores.events.save(&record)?;
        Ok(())
    }

    fn configuration(&self, owner_id: &str) -> Result<ReminderConfiguration, DispatchError> {
        self.stores
            .configurations
            .find_by_owner(owner_id)?
            .ok_or_else(|| DispatchError::ConfigurationNotFound(owner_id.to_string()))
    }

    fn invoice(&self, id: InvoiceId) -> Result<Invoice, DispatchError> {
        self.stores
            .invoices
            .find_by_id(id)?
            .ok_or(DispatchError::InvoiceNotFound(id))
    }

    fn client(&self, id: ClientId) -> Result<Client, DispatchError> {
        self.stores
            .clients
            .find_by_id(id)?
            .ok_or(DispatchError::ClientNotFound(id))
    }
}

/// Whether a message of `kind` still makes sense for `invoice` as it is now.
fn still_applies(kind: NotificationKind, invoice: &Invoice) -> bool {
    match kind {
        NotificationKind::Reminder => {
            invoice.status() == InvoiceStatus::Pending && !invoice.reminder_sent()
        }
        NotificationKind::Billing => invoice.status() == InvoiceStatus::Overdue,
        NotificationKind::Confirmation => invoice.status() == InvoiceStatus::Paid,
    }
}

fn context<'a>(
    client: &'a Client,
    invoice: &'a Invoice,
    finance_contact: &'a str,
    now: DateTime<Utc>,
) -> TemplateContext<'a> {
    TemplateContext {
        client_name: client.name(),
        invoice_number: invoice.number().as_str(),
        amount: format!("{:.2}", invoice.amount()),
        due_date: invoice.due_at().date_naive(),
        days_until_due: invoice.days_until_due(now),
        finance_contact,
    }
}

fn render_for(
    template: &str,
    client: &Client,
    invoice: &Invoice,
    configuration: &ReminderConfiguration,
    now: DateTime<Utc>,
) -> String {
    render(template, &context(client, invoice, configuration.finance_contact(), now))
}
