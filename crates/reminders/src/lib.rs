//! Reminder settings module.
//!
//! Per-owner reminder configuration, the send-window rule that decides whether
//! a moment is eligible for automatic sending, and message templates. Pure
//! domain logic (no IO, no HTTP, no storage).

pub mod configuration;
pub mod template;
pub mod window;

pub use configuration::{
    ConfigurationCreated, ConfigurationEvent, ConfigurationUpdated, DEFAULT_DAYS_BEFORE_REMINDER,
    MAX_DAYS_BEFORE_REMINDER, ReminderConfiguration, ReminderSettings, validate_reminder_days,
};
pub use template::{
    DEFAULT_BILLING_TEMPLATE, DEFAULT_CONFIRMATION_TEMPLATE, DEFAULT_REMINDER_TEMPLATE,
    TemplateContext, render,
};
pub use window::{SendWindow, TimeOfDay};
