use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FriendRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub receiver_id: Uuid,
    pub message: Option<String>,
    pub status: FriendRequestStatus,
    pub responded_at: Option<Millis>,
    pub created_at: Millis,
}

impl Entity for FriendRequest {
    const COLLECTION: &'static str = "friend_requests";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// One direction of a friendship; accepted requests store both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Friendship {
    pub id: Uuid,
    pub user_id: Uuid,
    pub friend_id: Uuid,
    pub created_at: Millis,
}

impl Entity for Friendship {
    const COLLECTION: &'static str = "friendships";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id", "friend_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub notifications_enabled: bool,
    pub created_at: Millis,
}

impl Entity for Follow {
    const COLLECTION: &'static str = "follows";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["follower_id", "following_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
