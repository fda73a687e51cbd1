//! Invoicing domain module.
//!
//! This crate contains the invoice payment lifecycle (pending, paid, overdue,
//! cancelled) and the reminder-eligibility rule, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod invoice;
pub mod number;

pub use invoice::{
    Invoice, InvoiceCancelled, InvoiceEvent, InvoiceIssued, InvoiceMarkedOverdue, InvoicePaid,
    InvoiceRecord, InvoiceStatus, ReminderMarkedSent,
};
pub use number::InvoiceNumber;
pub use rust_decimal::Decimal;
