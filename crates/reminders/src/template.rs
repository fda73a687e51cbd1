//! Message body templates.
//!
//! Placeholders: `{client}`, `{invoice}`, `{amount}`, `{due_date}` (DD/MM/YYYY),
//! `{days}` (whole days until due, negative once overdue) and `{finance_contact}`.
//! Unknown placeholders are left as written.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{([a-z_]+)\}")
            .unwrap_or_else(|error| panic!("placeholder regex failed to compile: {error}"))
    })
}

pub const DEFAULT_REMINDER_TEMPLATE: &str = "Hello {client}, invoice {invoice} of {amount} is due on {due_date} ({days} day(s) left).";

pub const DEFAULT_BILLING_TEMPLATE: &str = "Hello {client}, invoice {invoice} of {amount} was due on {due_date} and is still open. Questions: {finance_contact}.";

pub const DEFAULT_CONFIRMATION_TEMPLATE: &str =
    "Hello {client}, we received the payment for invoice {invoice} of {amount}. Thank you!";

/// Values substituted into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext<'a> {
    pub client_name: &'a str,
    pub invoice_number: &'a str,
    pub amount: String,
    pub due_date: NaiveDate,
    pub days_until_due: i64,
    pub finance_contact: &'a str,
}

/// Substitute placeholders in one pass; substituted values are never
/// rescanned.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "client" => ctx.client_name.to_string(),
            "invoice" => ctx.invoice_number.to_string(),
            "amount" => ctx.amount.clone(),
            "due_date" => ctx.due_date.format("%d/%m/%Y").to_string(),
            "days" => ctx.days_until_due.to_string(),
            "finance_contact" => ctx.finance_contact.to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}
