use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceStatus {
    #[default]
    Online,
    Offline,
    Away,
    InGame,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPresence {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: PresenceStatus,
    pub platform: Option<String>,
    pub activity: Option<String>,
    pub region: Option<String>,
    pub metadata: Value,
    pub last_seen: Millis,
}

impl Entity for UserPresence {
    const COLLECTION: &'static str = "user_presence";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Direct message between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub sent_at: Millis,
}

impl Entity for ChatMessage {
    const COLLECTION: &'static str = "chat_messages";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Stable conversation key for a pair of users, independent of direction.
pub fn conversation_id(a: Uuid, b: Uuid) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}::{high}")
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LobbyStatus {
    #[default]
    Open,
    Full,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LobbyRole {
    Host,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LobbyMember {
    pub user_id: Uuid,
    pub role: LobbyRole,
    pub is_ready: bool,
    pub joined_at: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameLobby {
    pub id: Uuid,
    pub host_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub game_id: Option<Uuid>,
    pub max_members: u32,
    pub is_private: bool,
    pub passcode: Option<String>,
    pub region: Option<String>,
    pub status: LobbyStatus,
    pub metadata: Value,
    /// Ordered by join time.
    pub members: Vec<LobbyMember>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl GameLobby {
    pub fn member(&self, user_id: Uuid) -> Option<&LobbyMember> {
        self.members.iter().find(|member| member.user_id == user_id)
    }

    pub fn refresh_status(&mut self) {
        self.status = if self.members.len() as u32 >= self.max_members {
            LobbyStatus::Full
        } else {
            LobbyStatus::Open
        };
    }
}

impl Entity for GameLobby {
    const COLLECTION: &'static str = "game_lobbies";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LobbyMessage {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: Millis,
}

impl Entity for LobbyMessage {
    const COLLECTION: &'static str = "lobby_messages";

    fn id(&self) -> Uuid {
        self.id
    }
}
