//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is recoverable: the operation that produced it has not mutated
/// the entity it was invoked on. Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input rejected at construction or update time.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A terminal-state guard refused a state transition.
    #[error("illegal transition: {0}")]
    Transition(#[from] TransitionError),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition(_))
    }
}

/// Invariant violations detected while building or updating an entity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must have at least {min} characters")]
    NameTooShort { min: usize },

    #[error("contact handle must contain only digits and have between 10 and 15 of them")]
    InvalidContactHandle,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("owner id is required")]
    OwnerRequired,

    #[error("days before reminder must be between {min} and {max} (got {got})")]
    InvalidReminderDays { min: u32, max: u32, got: i64 },

    #[error("invalid time format {0:?}, expected HH:MM")]
    InvalidTimeFormat(String),

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("due date must be in the future")]
    DueDateInPast,

    #[error("invalid invoice number {0:?}")]
    InvalidInvoiceNumber(String),

    #[error("destination cannot be empty")]
    EmptyDestination,

    #[error("message body cannot be empty")]
    EmptyBody,

    #[error("updated_at precedes created_at")]
    TimestampsOutOfOrder,
}

/// Rejections raised by the invoice lifecycle guards.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invoice is already paid")]
    AlreadyPaid,

    #[error("invoice is already cancelled")]
    AlreadyCancelled,

    #[error("a paid invoice cannot be cancelled")]
    CannotCancelPaid,

    #[error("a cancelled invoice cannot be paid")]
    CannotPayCancelled,
}
