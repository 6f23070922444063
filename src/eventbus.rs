//! Fire-and-forget domain event publisher (spec §9), generalized from the
//! teacher's `broadcast::Sender<String>` WebSocket score-update fan-out into
//! a typed topic/payload pair any subscriber (WebSocket clients, future
//! consumers) can tap into.
//!
//! Topics follow `sportsbook.events.<aggregate>.<event-type>`, e.g.
//! `sportsbook.events.bet.accepted`. Publish never fails the caller: a full
//! or closed channel is logged and swallowed, matching spec §7's "domain
//! operations must not fail because of event bus unavailability".

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        EventBus { sender }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Publishes `payload` under `sportsbook.events.<aggregate>.<event_type>`.
    /// Never propagates an error; a publish with no subscribers is the
    /// common case, not a failure.
    pub fn publish(&self, aggregate: &str, event_type: &str, payload: impl Serialize) {
        let topic = format!("sportsbook.events.{aggregate}.{event_type}");
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(topic = %topic, error = %e, "failed to serialize event payload");
                return;
            }
        };
        if let Err(e) = self.sender.send(DomainEvent { topic: topic.clone(), payload }) {
            debug!(topic = %topic, error = %e, "event published with no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish("bet", "accepted", json!({"betId": "b1"}));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "sportsbook.events.bet.accepted");
        assert_eq!(event.payload["betId"], "b1");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish("wallet", "deposited", json!({"amount": "10.00"}));
    }
}
