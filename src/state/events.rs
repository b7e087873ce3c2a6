use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::models::{Millis, now_millis};

/// Domain event as logged and fanned out by the [`EventBus`].
#[derive(Clone, Debug, Serialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub occurred_at: Millis,
}

/// In-process event bus: every event is logged, then broadcast to live subscribers.
///
/// There is no durable broker behind it; events published with no subscriber
/// only exist in the logs.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Construct a bus backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Log and broadcast an event; never fails the caller.
    pub fn publish(&self, topic: &str, event_type: &str, payload: impl Serialize) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(topic, event_type, error = %err, "dropping unserialisable event");
                return;
            }
        };
        info!(topic, event_type, payload = %payload, "domain event");

        let _ = self.sender.send(DomainEvent {
            id: Uuid::new_v4(),
            topic: topic.to_owned(),
            event_type: event_type.to_owned(),
            payload,
            occurred_at: now_millis(),
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish("reviews", "review.created", json!({"rating": 5}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "reviews");
        assert_eq!(event.event_type, "review.created");
        assert_eq!(event.payload["rating"], 5);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(1);
        bus.publish("social", "follow.created", json!({}));
    }
}
