use core::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use payremind_core::{ValidationError, ValueObject};

static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn number_regex() -> &'static Regex {
    NUMBER_RE.get_or_init(|| {
        Regex::new(r"^FAT-[0-9]{8}-[0-9]{6}$")
            .unwrap_or_else(|error| panic!("invoice number regex failed to compile: {error}"))
    })
}

/// Human-readable invoice label: `FAT-YYYYMMDD-NNNNNN`.
///
/// Creation date plus a random 6-digit suffix. Not unique; the invoice id is
/// the identity, this is for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceNumber(String);

impl ValueObject for InvoiceNumber {}

impl InvoiceNumber {
    pub fn generate<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: u32 = rng.random_range(0..1_000_000);
        Self(format!("FAT-{}-{suffix:06}", now.format("%Y%m%d")))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !number_regex().is_match(&value) {
            return Err(ValidationError::InvalidInvoiceNumber(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InvoiceNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<InvoiceNumber> for String {
    fn from(value: InvoiceNumber) -> Self {
        value.0
    }
}
