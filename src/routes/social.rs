use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::social::{
        CreateFollowRequest, CreateFriendRequest, FollowResponse, FriendRequestResponse,
        FriendResponse, RespondFriendRequest,
    },
    error::AppError,
    services::social_service,
    state::SharedState,
};

/// Friend requests, friendships and follows.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/friend-requests", post(send_friend_request))
        .route("/friend-requests/pending/{user_id}", get(pending_requests))
        .route("/friend-requests/{id}/respond", post(respond_friend_request))
        .route("/friends/{user_id}", get(list_friends))
        .route("/follows", post(follow))
        .route("/follows/{user_id}/following", get(following))
        .route("/follows/{user_id}/followers", get(followers))
        .route("/follows/{user_id}/{following_id}", delete(unfollow))
}

#[utoipa::path(
    post,
    path = "/api/v1/social/friend-requests",
    tag = "social",
    request_body = CreateFriendRequest,
    responses(
        (status = 201, description = "Request sent", body = FriendRequestResponse),
        (status = 400, description = "Self request, already friends or already pending")
    )
)]
pub async fn send_friend_request(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateFriendRequest>>,
) -> Result<(StatusCode, Json<FriendRequestResponse>), AppError> {
    let request = social_service::send_friend_request(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Accept, reject or cancel a pending friend request.
#[utoipa::path(
    post,
    path = "/api/v1/social/friend-requests/{id}/respond",
    tag = "social",
    params(("id" = Uuid, Path, description = "Friend request identifier")),
    request_body = RespondFriendRequest,
    responses(
        (status = 200, description = "Request resolved", body = FriendRequestResponse),
        (status = 400, description = "Request already resolved"),
        (status = 404, description = "Unknown request")
    )
)]
pub async fn respond_friend_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondFriendRequest>,
) -> Result<Json<FriendRequestResponse>, AppError> {
    Ok(Json(
        social_service::respond_friend_request(&state, id, payload.action).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/social/friend-requests/pending/{user_id}",
    tag = "social",
    params(("user_id" = Uuid, Path, description = "Receiving user")),
    responses((status = 200, description = "Pending requests", body = [FriendRequestResponse]))
)]
pub async fn pending_requests(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FriendRequestResponse>>, AppError> {
    Ok(Json(social_service::pending_requests(&state, user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/social/friends/{user_id}",
    tag = "social",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses((status = 200, description = "Friends", body = [FriendResponse]))
)]
pub async fn list_friends(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FriendResponse>>, AppError> {
    Ok(Json(social_service::list_friends(&state, user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/social/follows",
    tag = "social",
    request_body = CreateFollowRequest,
    responses(
        (status = 200, description = "Follow recorded", body = FollowResponse),
        (status = 400, description = "Self follow")
    )
)]
pub async fn follow(
    State(state): State<SharedState>,
    Json(payload): Json<CreateFollowRequest>,
) -> Result<Json<FollowResponse>, AppError> {
    Ok(Json(social_service::follow(&state, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/social/follows/{follower_id}/{following_id}",
    tag = "social",
    params(
        ("follower_id" = Uuid, Path, description = "Following user"),
        ("following_id" = Uuid, Path, description = "Followed user")
    ),
    responses(
        (status = 204, description = "Follow removed"),
        (status = 404, description = "No such follow")
    )
)]
pub async fn unfollow(
    State(state): State<SharedState>,
    Path((follower_id, following_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    social_service::unfollow(&state, follower_id, following_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/social/follows/{user_id}/following",
    tag = "social",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses((status = 200, description = "Users followed", body = [FollowResponse]))
)]
pub async fn following(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FollowResponse>>, AppError> {
    Ok(Json(social_service::following(&state, user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/social/follows/{user_id}/followers",
    tag = "social",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses((status = 200, description = "Followers", body = [FollowResponse]))
)]
pub async fn followers(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FollowResponse>>, AppError> {
    Ok(Json(social_service::followers(&state, user_id).await?))
}
