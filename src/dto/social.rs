use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::social::{Follow, FriendRequest, FriendRequestStatus, Friendship},
    dto::{format_millis, format_opt_millis},
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateFriendRequest {
    pub requester_id: Uuid,
    pub receiver_id: Uuid,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

/// Resolution applied to a pending friend request.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestAction {
    Accept,
    Reject,
    Cancel,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondFriendRequest {
    pub action: FriendRequestAction,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FriendRequestResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub receiver_id: Uuid,
    pub message: Option<String>,
    pub status: FriendRequestStatus,
    pub responded_at: Option<String>,
    pub created_at: String,
}

impl From<FriendRequest> for FriendRequestResponse {
    fn from(request: FriendRequest) -> Self {
        Self {
            id: request.id,
            requester_id: request.requester_id,
            receiver_id: request.receiver_id,
            message: request.message,
            status: request.status,
            responded_at: format_opt_millis(request.responded_at),
            created_at: format_millis(request.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FriendResponse {
    pub user_id: Uuid,
    pub friend_id: Uuid,
    pub since: String,
}

impl From<Friendship> for FriendResponse {
    fn from(friendship: Friendship) -> Self {
        Self {
            user_id: friendship.user_id,
            friend_id: friendship.friend_id,
            since: format_millis(friendship.created_at),
        }
    }
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFollowRequest {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    #[serde(default = "enabled")]
    pub notifications_enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowResponse {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub notifications_enabled: bool,
    pub created_at: String,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            id: follow.id,
            follower_id: follow.follower_id,
            following_id: follow.following_id,
            notifications_enabled: follow.notifications_enabled,
            created_at: format_millis(follow.created_at),
        }
    }
}
