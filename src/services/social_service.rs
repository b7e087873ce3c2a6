use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            now_millis,
            social::{Follow, FriendRequest, FriendRequestStatus, Friendship},
        },
    },
    dto::social::{
        CreateFollowRequest, CreateFriendRequest, FollowResponse, FriendRequestAction,
        FriendRequestResponse, FriendResponse,
    },
    error::ServiceError,
    services::peers::OutboundNotification,
    state::SharedState,
};

const TOPIC: &str = "social";

fn pair_filter(a: Uuid, b: Uuid, left: &str, right: &str) -> Filter {
    Filter::id(left, a)
        .and(Filter::id(right, b))
        .or(Filter::id(left, b).and(Filter::id(right, a)))
}

/// Ask another user for friendship.
pub async fn send_friend_request(
    state: &SharedState,
    request: CreateFriendRequest,
) -> Result<FriendRequestResponse, ServiceError> {
    let (from, to) = (request.requester_id, request.receiver_id);
    if from == to {
        return Err(ServiceError::InvalidInput(
            "cannot send a friend request to yourself".into(),
        ));
    }
    let already_friends = state
        .repo::<Friendship>()
        .await?
        .count(Filter::id("user_id", from).and(Filter::id("friend_id", to)))
        .await?;
    if already_friends > 0 {
        return Err(ServiceError::InvalidInput("users are already friends".into()));
    }

    let requests = state.repo::<FriendRequest>().await?;
    let pending = requests
        .count(
            pair_filter(from, to, "requester_id", "receiver_id")
                .and(Filter::eq("status", "pending")),
        )
        .await?;
    if pending > 0 {
        return Err(ServiceError::InvalidInput(
            "a friend request is already pending".into(),
        ));
    }

    let friend_request = FriendRequest {
        id: Uuid::new_v4(),
        requester_id: from,
        receiver_id: to,
        message: request.message,
        status: FriendRequestStatus::Pending,
        responded_at: None,
        created_at: now_millis(),
    };
    requests.insert(&friend_request).await?;

    state.events().publish(
        TOPIC,
        "friend_request.sent",
        json!({ "request_id": friend_request.id, "requester_id": from, "receiver_id": to }),
    );
    Ok(friend_request.into())
}

/// Resolve a pending request; accepting stores the friendship both ways.
pub async fn respond_friend_request(
    state: &SharedState,
    id: Uuid,
    action: FriendRequestAction,
) -> Result<FriendRequestResponse, ServiceError> {
    let requests = state.repo::<FriendRequest>().await?;
    let mut request = requests
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("friend request"))?;
    if request.status != FriendRequestStatus::Pending {
        return Err(ServiceError::InvalidInput(
            "friend request was already resolved".into(),
        ));
    }

    let now = now_millis();
    request.status = match action {
        FriendRequestAction::Accept => FriendRequestStatus::Accepted,
        FriendRequestAction::Reject => FriendRequestStatus::Rejected,
        FriendRequestAction::Cancel => FriendRequestStatus::Cancelled,
    };
    request.responded_at = Some(now);

    if action == FriendRequestAction::Accept {
        let friendships = state.repo::<Friendship>().await?;
        for (user_id, friend_id) in [
            (request.requester_id, request.receiver_id),
            (request.receiver_id, request.requester_id),
        ] {
            let exists = friendships
                .count(Filter::id("user_id", user_id).and(Filter::id("friend_id", friend_id)))
                .await?;
            if exists == 0 {
                friendships
                    .insert(&Friendship {
                        id: Uuid::new_v4(),
                        user_id,
                        friend_id,
                        created_at: now,
                    })
                    .await?;
            }
        }

        state.peers().notify(OutboundNotification {
            user_id: request.requester_id,
            title: "Friend request accepted".into(),
            message: "Your friend request was accepted.".into(),
            category: "social".into(),
            priority: "normal".into(),
            metadata: json!({ "friend_id": request.receiver_id, "request_id": request.id }),
        });
        info!(request_id = %request.id, "friend request accepted");
    }
    requests.replace(&request).await?;

    state.events().publish(
        TOPIC,
        "friend_request.resolved",
        json!({ "request_id": request.id, "status": request.status }),
    );
    Ok(request.into())
}

/// Requests awaiting an answer from `user_id`.
pub async fn pending_requests(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<FriendRequestResponse>, ServiceError> {
    let requests = state
        .repo::<FriendRequest>()
        .await?
        .find(
            Query::new(Filter::id("receiver_id", user_id).and(Filter::eq("status", "pending")))
                .sort_desc("created_at"),
        )
        .await?;
    Ok(requests.into_iter().map(Into::into).collect())
}

pub async fn list_friends(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<FriendResponse>, ServiceError> {
    let friends = state
        .repo::<Friendship>()
        .await?
        .find(Query::new(Filter::id("user_id", user_id)).sort_desc("created_at"))
        .await?;
    Ok(friends.into_iter().map(Into::into).collect())
}

/// Follow a user; following twice returns the existing follow.
pub async fn follow(
    state: &SharedState,
    request: CreateFollowRequest,
) -> Result<FollowResponse, ServiceError> {
    if request.follower_id == request.following_id {
        return Err(ServiceError::InvalidInput("cannot follow yourself".into()));
    }
    let follows = state.repo::<Follow>().await?;
    if let Some(existing) = follows
        .find_one(
            Filter::id("follower_id", request.follower_id)
                .and(Filter::id("following_id", request.following_id)),
        )
        .await?
    {
        return Ok(existing.into());
    }

    let follow = Follow {
        id: Uuid::new_v4(),
        follower_id: request.follower_id,
        following_id: request.following_id,
        notifications_enabled: request.notifications_enabled,
        created_at: now_millis(),
    };
    follows.insert(&follow).await?;
    state.events().publish(
        TOPIC,
        "follow.created",
        json!({ "follower_id": follow.follower_id, "following_id": follow.following_id }),
    );
    Ok(follow.into())
}

pub async fn unfollow(
    state: &SharedState,
    follower_id: Uuid,
    following_id: Uuid,
) -> Result<(), ServiceError> {
    let removed = state
        .repo::<Follow>()
        .await?
        .delete_many(Filter::id("follower_id", follower_id).and(Filter::id("following_id", following_id)))
        .await?;
    if removed == 0 {
        return Err(ServiceError::not_found("follow"));
    }
    state.events().publish(
        TOPIC,
        "follow.removed",
        json!({ "follower_id": follower_id, "following_id": following_id }),
    );
    Ok(())
}

pub async fn following(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<FollowResponse>, ServiceError> {
    let follows = state
        .repo::<Follow>()
        .await?
        .find(Query::new(Filter::id("follower_id", user_id)).sort_desc("created_at"))
        .await?;
    Ok(follows.into_iter().map(Into::into).collect())
}

pub async fn followers(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<FollowResponse>, ServiceError> {
    let follows = state
        .repo::<Follow>()
        .await?
        .find(Query::new(Filter::id("following_id", user_id)).sort_desc("created_at"))
        .await?;
    Ok(follows.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn ask(requester_id: Uuid, receiver_id: Uuid) -> CreateFriendRequest {
        CreateFriendRequest {
            requester_id,
            receiver_id,
            message: None,
        }
    }

    #[tokio::test]
    async fn accepting_creates_friendships_both_ways() {
        let state = memory_state().await;
        let (ada, grace) = (Uuid::new_v4(), Uuid::new_v4());
        let request = send_friend_request(&state, ask(ada, grace)).await.unwrap();
        assert_eq!(pending_requests(&state, grace).await.unwrap().len(), 1);

        let resolved = respond_friend_request(&state, request.id, FriendRequestAction::Accept)
            .await
            .unwrap();
        assert_eq!(resolved.status, FriendRequestStatus::Accepted);
        assert_eq!(list_friends(&state, ada).await.unwrap()[0].friend_id, grace);
        assert_eq!(list_friends(&state, grace).await.unwrap()[0].friend_id, ada);

        let again = respond_friend_request(&state, request.id, FriendRequestAction::Reject).await;
        assert!(matches!(again, Err(ServiceError::InvalidInput(_))));
        let duplicate = send_friend_request(&state, ask(grace, ada)).await;
        assert!(matches!(duplicate, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn pending_requests_block_both_directions() {
        let state = memory_state().await;
        let (ada, grace) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(
            send_friend_request(&state, ask(ada, ada)).await,
            Err(ServiceError::InvalidInput(_))
        ));
        send_friend_request(&state, ask(ada, grace)).await.unwrap();
        assert!(matches!(
            send_friend_request(&state, ask(grace, ada)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn follows_are_idempotent_and_removable() {
        let state = memory_state().await;
        let (fan, star) = (Uuid::new_v4(), Uuid::new_v4());
        let request = || CreateFollowRequest {
            follower_id: fan,
            following_id: star,
            notifications_enabled: true,
        };
        let first = follow(&state, request()).await.unwrap();
        let second = follow(&state, request()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(followers(&state, star).await.unwrap().len(), 1);
        assert_eq!(following(&state, fan).await.unwrap().len(), 1);

        unfollow(&state, fan, star).await.unwrap();
        assert!(matches!(
            unfollow(&state, fan, star).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
