use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::Value;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::state::DomainEvent;

/// Bus events belonging to one lobby.
pub fn is_lobby_event(event: &DomainEvent, lobby_id: Uuid) -> bool {
    event.topic == "online"
        && event
            .payload
            .get("lobby_id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            == Some(lobby_id)
}

/// Forward the lobby's bus events to an SSE response until the client
/// disconnects.
pub fn lobby_stream(
    mut receiver: broadcast::Receiver<DomainEvent>,
    lobby_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(event) if is_lobby_event(&event, lobby_id) => {
                            let frame = match Event::default()
                                .event(event.event_type.clone())
                                .json_data(&event)
                            {
                                Ok(frame) => frame,
                                Err(err) => {
                                    tracing::warn!(%lobby_id, error = %err, "skipping unencodable lobby event");
                                    continue;
                                }
                            };
                            if tx.send(Ok(frame)).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => continue,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(%lobby_id, skipped, "lobby stream lagged");
                            continue;
                        }
                    }
                }
            }
        }
        tracing::info!(%lobby_id, "lobby event stream disconnected");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::EventBus;

    #[tokio::test]
    async fn only_matching_lobby_events_pass() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let lobby = Uuid::new_v4();
        bus.publish("online", "lobby.joined", json!({ "lobby_id": lobby }));
        bus.publish("online", "lobby.joined", json!({ "lobby_id": Uuid::new_v4() }));
        bus.publish("social", "follow.created", json!({ "lobby_id": lobby }));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert!(is_lobby_event(&first, lobby));
        assert!(!is_lobby_event(&second, lobby));
        assert!(!is_lobby_event(&third, lobby));
    }
}
