//! `payremind-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod identity;
pub mod value_object;

pub use error::{DomainError, DomainResult, TransitionError, ValidationError};
pub use id::{ClientId, ConfigurationId, EventId, InvoiceId, NotificationId};
pub use identity::Identity;
pub use value_object::ValueObject;
