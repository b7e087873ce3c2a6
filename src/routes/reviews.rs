use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        SkipLimit,
        reviews::{
            CommentResponse, CreateCommentRequest, CreateReviewRequest, ReviewResponse,
            UpdateReviewRequest, VoteRequest, VoteResponse,
        },
    },
    error::AppError,
    services::reviews_service,
    state::SharedState,
};

/// Review, comment and helpfulness-vote endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_review))
        .route("/comments", post(add_comment))
        .route("/game/{game_id}", get(game_reviews))
        .route("/user/{user_id}", get(user_reviews))
        .route(
            "/{id}",
            get(get_review).patch(update_review).delete(delete_review),
        )
        .route("/{id}/comments", get(list_comments))
        .route("/{id}/vote", post(vote))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    tag = "reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 409, description = "User already reviewed the game")
    )
)]
pub async fn create_review(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateReviewRequest>>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let review = reviews_service::create_review(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review identifier")),
    responses(
        (status = 200, description = "Review", body = ReviewResponse),
        (status = 404, description = "Unknown review")
    )
)]
pub async fn get_review(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewResponse>, AppError> {
    Ok(Json(reviews_service::get_review(&state, id).await?))
}

/// Approved reviews of a game, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/reviews/game/{game_id}",
    tag = "reviews",
    params(("game_id" = Uuid, Path, description = "Game identifier"), SkipLimit),
    responses((status = 200, description = "Reviews", body = [ReviewResponse]))
)]
pub async fn game_reviews(
    State(state): State<SharedState>,
    Path(game_id): Path<Uuid>,
    Query(paging): Query<SkipLimit>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let (skip, limit) = paging.resolve(20, 100);
    Ok(Json(
        reviews_service::game_reviews(&state, game_id, skip, limit).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/user/{user_id}",
    tag = "reviews",
    params(("user_id" = Uuid, Path, description = "User identifier"), SkipLimit),
    responses((status = 200, description = "Reviews", body = [ReviewResponse]))
)]
pub async fn user_reviews(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(paging): Query<SkipLimit>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let (skip, limit) = paging.resolve(20, 100);
    Ok(Json(
        reviews_service::user_reviews(&state, user_id, skip, limit).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review identifier")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Updated review", body = ReviewResponse),
        (status = 404, description = "Unknown review")
    )
)]
pub async fn update_review(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateReviewRequest>>,
) -> Result<Json<ReviewResponse>, AppError> {
    Ok(Json(reviews_service::update_review(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review identifier")),
    responses(
        (status = 204, description = "Review, comments and votes deleted"),
        (status = 404, description = "Unknown review")
    )
)]
pub async fn delete_review(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    reviews_service::delete_review(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews/comments",
    tag = "reviews",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentResponse),
        (status = 404, description = "Unknown review")
    )
)]
pub async fn add_comment(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateCommentRequest>>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = reviews_service::add_comment(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/{id}/comments",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review identifier")),
    responses((status = 200, description = "Comments, oldest first", body = [CommentResponse]))
)]
pub async fn list_comments(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    Ok(Json(reviews_service::list_comments(&state, id).await?))
}

/// Cast or change a helpfulness vote.
#[utoipa::path(
    post,
    path = "/api/v1/reviews/{id}/vote",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review identifier"), VoteRequest),
    responses(
        (status = 201, description = "Vote recorded; review aggregates recounted", body = VoteResponse),
        (status = 404, description = "Unknown review")
    )
)]
pub async fn vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<VoteRequest>,
) -> Result<(StatusCode, Json<VoteResponse>), AppError> {
    let vote = reviews_service::vote(&state, id, params).await?;
    Ok((StatusCode::CREATED, Json(vote)))
}
