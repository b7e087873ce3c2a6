use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::online::{
        ChatMessage, GameLobby, LobbyMember, LobbyMessage, LobbyRole, LobbyStatus,
        PresenceStatus, UserPresence,
    },
    dto::format_millis,
    state::DomainEvent,
};

fn default_platform() -> Option<String> {
    Some("desktop".into())
}

fn default_max_members() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PresenceUpdate {
    pub user_id: Uuid,
    #[serde(default)]
    pub status: PresenceStatus,
    #[serde(default = "default_platform")]
    #[validate(length(max = 20))]
    pub platform: Option<String>,
    #[validate(length(max = 100))]
    pub activity: Option<String>,
    #[validate(length(max = 10))]
    pub region: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceResponse {
    pub user_id: Uuid,
    pub status: PresenceStatus,
    pub platform: Option<String>,
    pub activity: Option<String>,
    pub region: Option<String>,
    pub metadata: Value,
    pub last_seen: String,
}

impl From<UserPresence> for PresenceResponse {
    fn from(presence: UserPresence) -> Self {
        Self {
            user_id: presence.user_id,
            status: presence.status,
            platform: presence.platform,
            activity: presence.activity,
            region: presence.region,
            metadata: presence.metadata,
            last_seen: format_millis(presence.last_seen),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PresenceListParams {
    /// Comma-separated user identifiers.
    pub user_ids: Option<String>,
}

impl PresenceListParams {
    /// Identifiers that parse as UUIDs; anything else is ignored.
    pub fn ids(&self) -> Vec<Uuid> {
        self.user_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect()
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub sent_at: String,
}

impl From<ChatMessage> for ChatMessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            content: message.content,
            is_read: message.is_read,
            sent_at: format_millis(message.sent_at),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationParams {
    pub user_id: Uuid,
    pub peer_id: Uuid,
    /// Maximum number of messages (1..=100, default 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateLobbyRequest {
    pub host_id: Uuid,
    #[validate(length(min = 3, max = 80))]
    pub name: String,
    #[validate(length(max = 280))]
    pub description: Option<String>,
    pub game_id: Option<Uuid>,
    /// Clamped to the configured lobby size.
    #[serde(default = "default_max_members")]
    pub max_members: u32,
    #[serde(default)]
    pub is_private: bool,
    #[validate(length(max = 32))]
    pub passcode: Option<String>,
    #[validate(length(max = 20))]
    pub region: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LobbyMemberResponse {
    pub user_id: Uuid,
    pub role: LobbyRole,
    pub is_ready: bool,
    pub joined_at: String,
}

impl From<LobbyMember> for LobbyMemberResponse {
    fn from(member: LobbyMember) -> Self {
        Self {
            user_id: member.user_id,
            role: member.role,
            is_ready: member.is_ready,
            joined_at: format_millis(member.joined_at),
        }
    }
}

/// Lobby as shown to clients; the passcode never leaves the service.
#[derive(Debug, Serialize, ToSchema)]
pub struct LobbyResponse {
    pub id: Uuid,
    pub host_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub game_id: Option<Uuid>,
    pub max_members: u32,
    pub is_private: bool,
    pub region: Option<String>,
    pub status: LobbyStatus,
    pub metadata: Value,
    pub members: Vec<LobbyMemberResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<GameLobby> for LobbyResponse {
    fn from(lobby: GameLobby) -> Self {
        Self {
            id: lobby.id,
            host_id: lobby.host_id,
            name: lobby.name,
            description: lobby.description,
            game_id: lobby.game_id,
            max_members: lobby.max_members,
            is_private: lobby.is_private,
            region: lobby.region,
            status: lobby.status,
            metadata: lobby.metadata,
            members: lobby.members.into_iter().map(Into::into).collect(),
            created_at: format_millis(lobby.created_at),
            updated_at: format_millis(lobby.updated_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LobbyListParams {
    pub status: Option<LobbyStatus>,
    pub region: Option<String>,
    /// Maximum number of lobbies (1..=100, default 20).
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinLobbyRequest {
    pub user_id: Uuid,
    pub passcode: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LobbyUserParams {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReadyParams {
    pub user_id: Uuid,
    #[serde(default = "default_true")]
    pub is_ready: bool,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LobbyMessageRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LobbyMessageResponse {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: String,
}

impl From<LobbyMessage> for LobbyMessageResponse {
    fn from(message: LobbyMessage) -> Self {
        Self {
            id: message.id,
            lobby_id: message.lobby_id,
            user_id: message.user_id,
            content: message.content,
            created_at: format_millis(message.created_at),
        }
    }
}

/// Text frames sent over the lobby WebSocket.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbySocketFrame {
    /// Stored chat message replayed on connect, oldest first.
    History(LobbyMessageResponse),
    /// Live lobby event from the event bus.
    Event {
        event: String,
        #[schema(value_type = Object)]
        payload: Value,
        occurred_at: String,
    },
    /// Inbound message that could not be posted.
    Error { message: String },
}

impl From<&DomainEvent> for LobbySocketFrame {
    fn from(event: &DomainEvent) -> Self {
        LobbySocketFrame::Event {
            event: event.event_type.clone(),
            payload: event.payload.clone(),
            occurred_at: format_millis(event.occurred_at),
        }
    }
}
