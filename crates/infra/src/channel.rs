//! Outbound message delivery seam.
//!
//! The dispatcher only needs "send this body to this destination"; transport
//! specifics (messaging APIs, SMTP) belong to implementations of
//! [`OutboundChannel`]. Delivery failures are opaque `anyhow` errors and end up
//! as the notification's `last_error` text.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::bail;

pub trait OutboundChannel: Send + Sync {
    fn deliver(&self, destination: &str, body: &str) -> anyhow::Result<()>;
}

impl<C> OutboundChannel for Arc<C>
where
    C: OutboundChannel + ?Sized,
{
    fn deliver(&self, destination: &str, body: &str) -> anyhow::Result<()> {
        (**self).deliver(destination, body)
    }
}

/// A message accepted by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub destination: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct Recording {
    delivered: Vec<DeliveredMessage>,
    fail_next: u32,
    unreachable: HashSet<String>,
}

/// In-memory channel for tests/dev: records what it delivers and fails on
/// request.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    state: Mutex<Recording>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` deliveries regardless of destination.
    pub fn fail_next(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = count;
        }
    }

    /// Fail every delivery to `destination` until [`RecordingChannel::reachable`].
    pub fn unreachable(&self, destination: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.unreachable.insert(destination.into());
        }
    }

    pub fn reachable(&self, destination: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.unreachable.remove(destination);
        }
    }

    pub fn delivered(&self) -> Vec<DeliveredMessage> {
        self.state
            .lock()
            .map(|state| state.delivered.clone())
            .unwrap_or_default()
    }
}

impl OutboundChannel for RecordingChannel {
    fn deliver(&self, destination: &str, body: &str) -> anyhow::Result<()> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => bail!("recording channel lock poisoned"),
        };

        if state.fail_next > 0 {
            state.fail_next -= 1;
            bail!("gateway timeout");
        }
        if state.unreachable.contains(destination) {
            bail!("destination {destination} unreachable");
        }

        state.delivered.push(DeliveredMessage {
            destination: destination.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_successful_deliveries() {
        let channel = RecordingChannel::new();
        channel.deliver("5511999998888", "hello").unwrap();

        assert_eq!(
            channel.delivered(),
            vec![DeliveredMessage {
                destination: "5511999998888".to_string(),
                body: "hello".to_string(),
            }]
        );
    }

    #[test]
    fn fails_the_requested_number_of_times() {
        let channel = RecordingChannel::new();
        channel.fail_next(2);

        assert!(channel.deliver("a", "x").is_err());
        assert!(channel.deliver("a", "x").is_err());
        assert!(channel.deliver("a", "x").is_ok());
        assert_eq!(channel.delivered().len(), 1);
    }

    #[test]
    fn unreachable_destinations_fail_until_reset() {
        let channel = RecordingChannel::new();
        channel.unreachable("a");

        let err = channel.deliver("a", "x").unwrap_err();
        assert_eq!(format!("{err:#}"), "destination a unreachable");
        assert!(channel.deliver("b", "x").is_ok());

        channel.reachable("a");
        assert!(channel.deliver("a", "x").is_ok());
    }
}
