use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::online::{LobbyMessageRequest, LobbyMessageResponse, LobbySocketFrame},
    error::ServiceError,
    services::{online_service, sse_service::is_lobby_event},
    state::{DomainEvent, SharedState},
};

const TOPIC: &str = "online";

/// Serialize a frame into a text message; `None` if it cannot be encoded.
fn text_frame(frame: &LobbySocketFrame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(err) => {
            warn!(error = %err, "skipping unencodable lobby frame");
            None
        }
    }
}

fn publish_presence(state: &SharedState, lobby_id: Uuid, user_id: Uuid, subtype: &str) {
    state.events().publish(
        TOPIC,
        "lobby.presence",
        json!({ "lobby_id": lobby_id, "user_id": user_id, "subtype": subtype }),
    );
}

/// Forward bus events of `lobby_id` to the socket writer until either side closes.
fn spawn_forwarder(
    mut events: broadcast::Receiver<DomainEvent>,
    lobby_id: Uuid,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if is_lobby_event(&event, lobby_id) => {
                    let Some(message) = text_frame(&LobbySocketFrame::from(&event)) else {
                        continue;
                    };
                    if outbound_tx.send(message).is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(%lobby_id, skipped, "lobby socket lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Post one inbound text frame as the connected member. Returns `false` when
/// the member may no longer chat and the socket should close.
async fn relay_chat(
    state: &SharedState,
    lobby_id: Uuid,
    user_id: Uuid,
    content: String,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    let request = LobbyMessageRequest { user_id, content };
    let posted = match request.validate() {
        Ok(()) => online_service::post_lobby_message(state, lobby_id, request)
            .await
            .map(drop),
        Err(err) => Err(ServiceError::InvalidInput(err.to_string())),
    };
    match posted {
        Ok(()) => true,
        Err(err) => {
            warn!(%lobby_id, %user_id, error = %err, "lobby chat message rejected");
            let keep_open = matches!(err, ServiceError::InvalidInput(_));
            if let Some(message) = text_frame(&LobbySocketFrame::Error {
                message: err.to_string(),
            }) {
                let _ = outbound_tx.send(message);
            }
            keep_open
        }
    }
}

/// Run one lobby chat connection. Membership has been checked by the caller
/// and `history` is the chat replayed before live events.
pub async fn handle_lobby_socket(
    state: SharedState,
    socket: WebSocket,
    lobby_id: Uuid,
    user_id: Uuid,
    history: Vec<LobbyMessageResponse>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Subscribe before replaying so nothing published meanwhile is lost.
    let events = state.events().subscribe();
    for entry in history {
        if let Some(message) = text_frame(&LobbySocketFrame::History(entry)) {
            let _ = outbound_tx.send(message);
        }
    }
    let forwarder = spawn_forwarder(events, lobby_id, outbound_tx.clone());

    info!(%lobby_id, %user_id, "lobby socket connected");
    publish_presence(&state, lobby_id, user_id, "joined");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let content = text.as_str().to_owned();
                if !relay_chat(&state, lobby_id, user_id, content, &outbound_tx).await {
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%lobby_id, %user_id, error = %err, "lobby socket error");
                break;
            }
        }
    }

    publish_presence(&state, lobby_id, user_id, "disconnect");
    info!(%lobby_id, %user_id, "lobby socket disconnected");

    forwarder.abort();
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use serde_json::Value;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::*;
    use crate::{
        dto::online::CreateLobbyRequest, routes, state::test_support::memory_state,
    };

    /// Minimal RFC 6455 client: unmasked server frames, masked client frames.
    struct RawSocket {
        stream: TcpStream,
        buffer: Vec<u8>,
    }

    impl RawSocket {
        async fn connect(addr: SocketAddr, path: &str) -> (u16, Self) {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let request = format!(
                "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\n\
                 Upgrade: websocket\r\nSec-WebSocket-Version: 13\r\n\
                 Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
            );
            stream.write_all(request.as_bytes()).await.unwrap();
            let mut socket = Self {
                stream,
                buffer: Vec::new(),
            };
            let end = loop {
                if let Some(pos) = socket.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                socket.fill().await;
            };
            let head: Vec<u8> = socket.buffer.drain(..end).collect();
            let status = String::from_utf8_lossy(&head)
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse().ok())
                .unwrap();
            (status, socket)
        }

        async fn fill(&mut self) {
            let mut chunk = [0u8; 4096];
            let read = self.stream.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed");
            self.buffer.extend_from_slice(&chunk[..read]);
        }

        async fn take(&mut self, n: usize) -> Vec<u8> {
            while self.buffer.len() < n {
                self.fill().await;
            }
            self.buffer.drain(..n).collect()
        }

        async fn next_json(&mut self) -> Value {
            let head = self.take(2).await;
            assert_eq!(head[0] & 0x0f, 0x1, "expected a text frame");
            let len = match head[1] & 0x7f {
                126 => {
                    let ext = self.take(2).await;
                    u16::from_be_bytes([ext[0], ext[1]]) as usize
                }
                127 => {
                    let ext = self.take(8).await;
                    u64::from_be_bytes(ext.try_into().unwrap()) as usize
                }
                short => short as usize,
            };
            serde_json::from_slice(&self.take(len).await).unwrap()
        }

        async fn send_text(&mut self, text: &str) {
            let mask = [7u8, 1, 9, 3];
            let payload = text.as_bytes();
            assert!(payload.len() < 126);
            let mut frame = vec![0x81, 0x80 | payload.len() as u8];
            frame.extend_from_slice(&mask);
            frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
            self.stream.write_all(&frame).await.unwrap();
        }
    }

    #[tokio::test]
    async fn members_get_history_then_live_chat() {
        let state = memory_state().await;
        let host = Uuid::new_v4();
        let lobby = online_service::create_lobby(
            &state,
            CreateLobbyRequest {
                host_id: host,
                name: "Socket night".into(),
                description: None,
                game_id: None,
                max_members: 4,
                is_private: false,
                passcode: None,
                region: None,
                metadata: None,
            },
        )
        .await
        .unwrap();
        online_service::post_lobby_message(
            &state,
            lobby.id,
            LobbyMessageRequest {
                user_id: host,
                content: "gl".into(),
            },
        )
        .await
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let path = format!("/api/v1/online/ws/lobbies/{}", lobby.id);
        let stranger = format!("{path}?user_id={}", Uuid::new_v4());
        let (status, _) = RawSocket::connect(addr, &stranger).await;
        assert_eq!(status, 403);

        let member = format!("{path}?user_id={host}");
        let (status, mut socket) = RawSocket::connect(addr, &member).await;
        assert_eq!(status, 101);

        let history = socket.next_json().await;
        assert_eq!(history["type"], "history");
        assert_eq!(history["content"], "gl");

        let joined = socket.next_json().await;
        assert_eq!(joined["type"], "event");
        assert_eq!(joined["event"], "lobby.presence");
        assert_eq!(joined["payload"]["subtype"], "joined");

        socket.send_text("hello there").await;
        let chat = socket.next_json().await;
        assert_eq!(chat["event"], "lobby.message");
        assert_eq!(chat["payload"]["content"], "hello there");

        socket.send_text("").await;
        let rejected = socket.next_json().await;
        assert_eq!(rejected["type"], "error");

        let stored = online_service::lobby_messages(&state, lobby.id, host)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn event_frames_carry_type_and_payload() {
        let event = DomainEvent {
            id: Uuid::new_v4(),
            topic: "online".into(),
            event_type: "lobby.left".into(),
            payload: json!({ "user_id": "u" }),
            occurred_at: 0,
        };
        let Some(Message::Text(text)) = text_frame(&LobbySocketFrame::from(&event)) else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "event",
                "event": "lobby.left",
                "payload": { "user_id": "u" },
                "occurred_at": "1970-01-01T00:00:00Z",
            })
        );
    }
}
