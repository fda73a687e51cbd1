//! Clients domain module.
//!
//! This crate contains the validated customer record that invoices and
//! reminders are addressed to, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod client;

pub use client::{
    Client, ClientActivated, ClientDeactivated, ClientDetailsUpdated, ClientEvent,
    ClientRegistered, NAME_MIN_CHARS,
};
