//! Storage contracts for the entities, plus in-memory adapters.
//!
//! Lookups return `Ok(None)` when nothing matches; only backend failures and
//! write conflicts are errors.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{
    InMemoryClientRepository, InMemoryConfigurationRepository, InMemoryInvoiceRepository,
    InMemoryNotificationRepository,
};
pub use r#trait::{
    ClientRepository, ConfigurationRepository, InvoiceRepository, NotificationRepository,
    StoreError,
};
