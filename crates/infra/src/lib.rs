//! Infrastructure layer: storage contracts and in-memory adapters, the event
//! store, outbound delivery, configuration loading and the reminder dispatcher.

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod event_store;
pub mod repository;

#[cfg(test)]
mod integration_tests;
