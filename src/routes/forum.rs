use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    dto::forum::{
        CreatePostRequest, CreateReplyRequest, LikeResponse, PostListParams, PostPage,
        PostResponse, ReplyResponse, UpdatePostRequest,
    },
    error::AppError,
    services::forum_service,
    state::SharedState,
};

/// Discussion posts and threaded replies. Writes require a bearer token.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/like", post(toggle_like))
        .route("/posts/{id}/replies", get(list_replies).post(create_reply))
}

#[utoipa::path(
    post,
    path = "/api/v1/forum/posts",
    tag = "forum",
    security(("bearer" = [])),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_post(
    State(state): State<SharedState>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<CreatePostRequest>>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let post = forum_service::create_post(&state, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/api/v1/forum/posts",
    tag = "forum",
    params(PostListParams),
    responses((status = 200, description = "Active posts, pinned first", body = PostPage))
)]
pub async fn list_posts(
    State(state): State<SharedState>,
    Query(params): Query<PostListParams>,
) -> Result<Json<PostPage>, AppError> {
    Ok(Json(forum_service::list_posts(&state, params).await?))
}

/// Reading a post counts as a view.
#[utoipa::path(
    get,
    path = "/api/v1/forum/posts/{id}",
    tag = "forum",
    params(("id" = Uuid, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 404, description = "Unknown or deleted post")
    )
)]
pub async fn get_post(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(forum_service::view_post(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/forum/posts/{id}",
    tag = "forum",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post", body = PostResponse),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Unknown post")
    )
)]
pub async fn update_post(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<UpdatePostRequest>>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(
        forum_service::update_post(&state, id, auth.user_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/forum/posts/{id}",
    tag = "forum",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Unknown post")
    )
)]
pub async fn delete_post(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    forum_service::delete_post(&state, id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/forum/posts/{id}/like",
    tag = "forum",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    responses((status = 200, description = "Like toggled", body = LikeResponse))
)]
pub async fn toggle_like(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<LikeResponse>, AppError> {
    Ok(Json(
        forum_service::toggle_like(&state, id, auth.user_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/forum/posts/{id}/replies",
    tag = "forum",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    request_body = CreateReplyRequest,
    responses(
        (status = 201, description = "Reply added", body = ReplyResponse),
        (status = 409, description = "Post is locked")
    )
)]
pub async fn create_reply(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<CreateReplyRequest>>,
) -> Result<(StatusCode, Json<ReplyResponse>), AppError> {
    let reply = forum_service::create_reply(&state, id, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

#[utoipa::path(
    get,
    path = "/api/v1/forum/posts/{id}/replies",
    tag = "forum",
    params(("id" = Uuid, Path, description = "Post identifier")),
    responses((status = 200, description = "Threaded replies", body = [ReplyResponse]))
)]
pub async fn list_replies(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReplyResponse>>, AppError> {
    Ok(Json(forum_service::list_replies(&state, id).await?))
}
