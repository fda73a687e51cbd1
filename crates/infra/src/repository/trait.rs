use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use payremind_clients::Client;
use payremind_core::{ClientId, InvoiceId, NotificationId};
use payremind_invoicing::Invoice;
use payremind_notifications::{Notification, NotificationStatus};
use payremind_reminders::ReminderConfiguration;

/// Repository operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write would break a uniqueness rule (duplicate id or key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record to update or delete does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub trait ClientRepository: Send + Sync {
    fn save(&self, client: &Client) -> Result<(), StoreError>;
    fn find_by_id(&self, id: ClientId) -> Result<Option<Client>, StoreError>;
    fn find_by_contact_handle(&self, handle: &str) -> Result<Option<Client>, StoreError>;
    /// All clients, oldest first.
    fn find_all(&self) -> Result<Vec<Client>, StoreError>;
    fn update(&self, client: &Client) -> Result<(), StoreError>;
    fn delete(&self, id: ClientId) -> Result<(), StoreError>;
}

/// One configuration per owner.
pub trait ConfigurationRepository: Send + Sync {
    /// Insert, or replace the owner's existing configuration.
    fn save(&self, configuration: &ReminderConfiguration) -> Result<(), StoreError>;
    fn find_by_owner(&self, owner_id: &str) -> Result<Option<ReminderConfiguration>, StoreError>;
    fn update(&self, configuration: &ReminderConfiguration) -> Result<(), StoreError>;
}

pub trait InvoiceRepository: Send + Sync {
    fn save(&self, invoice: &Invoice) -> Result<(), StoreError>;
    fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;
    fn find_by_client(&self, client_id: ClientId) -> Result<Vec<Invoice>, StoreError>;
    /// Pending invoices, earliest due first.
    fn find_pending(&self) -> Result<Vec<Invoice>, StoreError>;
    /// Pending invoices whose due calendar date (UTC) is `days` after `now`'s.
    fn find_due_in_days(&self, days: u32, now: DateTime<Utc>) -> Result<Vec<Invoice>, StoreError>;
    fn update(&self, invoice: &Invoice) -> Result<(), StoreError>;
}

pub trait NotificationRepository: Send + Sync {
    fn save(&self, notification: &Notification) -> Result<(), StoreError>;
    fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;
    /// Notifications about one invoice, oldest first.
    fn find_by_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Notification>, StoreError>;
    fn find_by_status(&self, status: NotificationStatus) -> Result<Vec<Notification>, StoreError>;
    /// Notifications that exhausted their attempts without being sent.
    fn find_dead_letter_eligible(&self) -> Result<Vec<Notification>, StoreError>;
    fn update(&self, notification: &Notification) -> Result<(), StoreError>;
}

impl<S> ClientRepository for Arc<S>
where
    S: ClientRepository + ?Sized,
{
    fn save(&self, client: &Client) -> Result<(), StoreError> {
        (**self).save(client)
    }

    fn find_by_id(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_contact_handle(&self, handle: &str) -> Result<Option<Client>, StoreError> {
        (**self).find_by_contact_handle(handle)
    }

    fn find_all(&self) -> Result<Vec<Client>, StoreError> {
        (**self).find_all()
    }

    fn update(&self, client: &Client) -> Result<(), StoreError> {
        (**self).update(client)
    }

    fn delete(&self, id: ClientId) -> Result<(), StoreError> {
        (**self).delete(id)
    }
}

impl<S> ConfigurationRepository for Arc<S>
where
    S: ConfigurationRepository + ?Sized,
{
    fn save(&self, configuration: &ReminderConfiguration) -> Result<(), StoreError> {
        (**self).save(configuration)
    }

    fn find_by_owner(&self, owner_id: &str) -> Result<Option<ReminderConfiguration>, StoreError> {
        (**self).find_by_owner(owner_id)
    }

    fn update(&self, configuration: &ReminderConfiguration) -> Result<(), StoreError> {
        (**self).update(configuration)
    }
}

impl<S> InvoiceRepository for Arc<S>
where
    S: InvoiceRepository + ?Sized,
{
    fn save(&self, invoice: &Invoice) -> Result<(), StoreError> {
        (**self).save(invoice)
    }

    fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_client(&self, client_id: ClientId) -> Result<Vec<Invoice>, StoreError> {
        (**self).find_by_client(client_id)
    }

    fn find_pending(&self) -> Result<Vec<Invoice>, StoreError> {
        (**self).find_pending()
    }

    fn find_due_in_days(&self, days: u32, now: DateTime<Utc>) -> Result<Vec<Invoice>, StoreError> {
        (**self).find_due_in_days(days, now)
    }

    fn update(&self, invoice: &Invoice) -> Result<(), StoreError> {
        (**self).update(invoice)
    }
}

impl<S> NotificationRepository for Arc<S>
where
    S: NotificationRepository + ?Sized,
{
    fn save(&self, notification: &Notification) -> Result<(), StoreError> {
        (**self).save(notification)
    }

    fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Notification>, StoreError> {
        (**self).find_by_invoice(invoice_id)
    }

    fn find_by_status(&self, status: NotificationStatus) -> Result<Vec<Notification>, StoreError> {
        (**self).find_by_status(status)
    }

    fn find_dead_letter_eligible(&self) -> Result<Vec<Notification>, StoreError> {
        (**self).find_dead_letter_eligible()
    }

    fn update(&self, notification: &Notification) -> Result<(), StoreError> {
        (**self).update(notification)
    }
}
