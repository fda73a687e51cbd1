use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, TimeDelta, Utc};

use payremind_clients::Client;
use payremind_core::{ClientId, InvoiceId, NotificationId};
use payremind_invoicing::{Invoice, InvoiceStatus};
use payremind_notifications::{Notification, NotificationStatus};
use payremind_reminders::ReminderConfiguration;

use super::r#trait::{
    ClientRepository, ConfigurationRepository, InvoiceRepository, NotificationRepository,
    StoreError,
};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory client store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryClientRepository {
    rows: RwLock<HashMap<ClientId, Client>>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientRepository for InMemoryClientRepository {
    fn save(&self, client: &Client) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        if rows.contains_key(&client.id()) {
            return Err(StoreError::Conflict(format!("client {} already exists", client.id())));
        }
        rows.insert(client.id(), client.clone());
        Ok(())
    }

    fn find_by_id(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    fn find_by_contact_handle(&self, handle: &str) -> Result<Option<Client>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.values().find(|c| c.contact_handle() == handle).cloned())
    }

    fn find_all(&self) -> Result<Vec<Client>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut clients: Vec<Client> = rows.values().cloned().collect();
        clients.sort_by_key(|c| (c.identity().created_at(), *c.id().as_uuid()));
        Ok(clients)
    }

    fn update(&self, client: &Client) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.get_mut(&client.id()) {
            Some(row) => {
                *row = client.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("client {}", client.id()))),
        }
    }

    fn delete(&self, id: ClientId) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("client {id}")))
    }
}

/// In-memory configuration store for tests/dev, keyed by owner.
#[derive(Debug, Default)]
pub struct InMemoryConfigurationRepository {
    by_owner: RwLock<HashMap<String, ReminderConfiguration>>,
}

impl InMemoryConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigurationRepository for InMemoryConfigurationRepository {
    fn save(&self, configuration: &ReminderConfiguration) -> Result<(), StoreError> {
        let mut by_owner = self.by_owner.write().map_err(poisoned)?;
        by_owner.insert(configuration.owner_id().to_string(), configuration.clone());
        Ok(())
    }

    fn find_by_owner(&self, owner_id: &str) -> Result<Option<ReminderConfiguration>, StoreError> {
        let by_owner = self.by_owner.read().map_err(poisoned)?;
        Ok(by_owner.get(owner_id).cloned())
    }

    fn update(&self, configuration: &ReminderConfiguration) -> Result<(), StoreError> {
        let mut by_owner = self.by_owner.write().map_err(poisoned)?;
        match by_owner.get_mut(configuration.owner_id()) {
            Some(row) => {
                *row = configuration.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "configuration for owner {}",
                configuration.owner_id()
            ))),
        }
    }
}

/// In-memory invoice store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    rows: RwLock<HashMap<InvoiceId, Invoice>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending_where<F>(&self, keep: F) -> Result<Vec<Invoice>, StoreError>
    where
        F: Fn(&Invoice) -> bool,
    {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut invoices: Vec<Invoice> = rows
            .values()
            .filter(|i| i.status() == InvoiceStatus::Pending && keep(i))
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.due_at(), *i.id().as_uuid()));
        Ok(invoices)
    }
}

impl InvoiceRepository for InMemoryInvoiceRepository {
    fn save(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        if rows.contains_key(&invoice.id()) {
            return Err(StoreError::Conflict(format!("invoice {} already exists", invoice.id())));
        }
        if rows.values().any(|i| i.number() == invoice.number()) {
            return Err(StoreError::Conflict(format!(
                "invoice number {} already in use",
                invoice.number()
            )));
        }
        rows.insert(invoice.id(), invoice.clone());
        Ok(())
    }

    fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    fn find_by_client(&self, client_id: ClientId) -> Result<Vec<Invoice>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut invoices: Vec<Invoice> = rows
            .values()
            .filter(|i| i.client_id() == client_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.identity().created_at(), *i.id().as_uuid()));
        Ok(invoices)
    }

    fn find_pending(&self) -> Result<Vec<Invoice>, StoreError> {
        self.pending_where(|_| true)
    }

    fn find_due_in_days(&self, days: u32, now: DateTime<Utc>) -> Result<Vec<Invoice>, StoreError> {
        let Some(target) = TimeDelta::try_days(i64::from(days))
            .and_then(|offset| now.checked_add_signed(offset))
            .map(|due| due.date_naive())
        else {
            return Ok(vec![]);
        };
        self.pending_where(|i| i.due_at().date_naive() == target)
    }

    fn update(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.get_mut(&invoice.id()) {
            Some(row) => {
                *row = invoice.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("invoice {}", invoice.id()))),
        }
    }
}

/// In-memory notification store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotificationRepository {
    rows: RwLock<HashMap<NotificationId, Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn filtered<F>(&self, keep: F) -> Result<Vec<Notification>, StoreError>
    where
        F: Fn(&Notification) -> bool,
    {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut notifications: Vec<Notification> =
            rows.values().filter(|n| keep(n)).cloned().collect();
        notifications.sort_by_key(|n| (n.identity().created_at(), *n.id().as_uuid()));
        Ok(notifications)
    }
}

impl NotificationRepository for InMemoryNotificationRepository {
    fn save(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        if rows.contains_key(&notification.id()) {
            return Err(StoreError::Conflict(format!(
                "notification {} already exists",
                notification.id()
            )));
        }
        rows.insert(notification.id(), notification.clone());
        Ok(())
    }

    fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    fn find_by_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Notification>, StoreError> {
        self.filtered(|n| n.invoice_id() == invoice_id)
    }

    fn find_by_status(&self, status: NotificationStatus) -> Result<Vec<Notification>, StoreError> {
        self.filtered(|n| n.status() == status)
    }

    fn find_dead_letter_eligible(&self) -> Result<Vec<Notification>, StoreError> {
        self.filtered(Notification::is_dead_lettered)
    }

    fn update(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.get_mut(&notification.id()) {
            Some(row) => {
                *row = notification.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("notification {}", notification.id()))),
        }
    }
}
