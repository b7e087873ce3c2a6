use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::recommendations::{
        FeedbackRequest, FeedbackResponse, GenerationRequest, InteractionBatch,
        InteractionIngestResponse, RecommendationBatchRequest, RecommendationListParams,
        RecommendationResponse, TrainingRequest, TrainingResponse,
    },
    error::AppError,
    services::recommendations_service,
    state::SharedState,
};

/// Stored recommendation batches, feedback, interactions and the collaborative model.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/batch", post(replace_batch))
        .route("/user/{user_id}", get(user_recommendations))
        .route("/user/{user_id}/generate", post(generate))
        .route("/feedback", post(record_feedback))
        .route("/interactions", post(ingest_interactions))
        .route("/train", post(train))
}

#[utoipa::path(
    post,
    path = "/api/v1/recommendations/batch",
    tag = "recommendations",
    request_body = RecommendationBatchRequest,
    responses(
        (status = 201, description = "Batch stored", body = [RecommendationResponse]),
        (status = 400, description = "Empty batch")
    )
)]
pub async fn replace_batch(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RecommendationBatchRequest>>,
) -> Result<(StatusCode, Json<Vec<RecommendationResponse>>), AppError> {
    let batch = recommendations_service::replace_batch(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

#[utoipa::path(
    get,
    path = "/api/v1/recommendations/user/{user_id}",
    tag = "recommendations",
    params(("user_id" = Uuid, Path, description = "User identifier"), RecommendationListParams),
    responses((status = 200, description = "Active recommendations by rank", body = [RecommendationResponse]))
)]
pub async fn user_recommendations(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<RecommendationListParams>,
) -> Result<Json<Vec<RecommendationResponse>>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 50);
    Ok(Json(
        recommendations_service::user_recommendations(&state, user_id, limit).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/recommendations/feedback",
    tag = "recommendations",
    request_body = FeedbackRequest,
    responses((status = 201, description = "Feedback recorded", body = FeedbackResponse))
)]
pub async fn record_feedback(
    State(state): State<SharedState>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackResponse>), AppError> {
    let feedback = recommendations_service::record_feedback(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[utoipa::path(
    post,
    path = "/api/v1/recommendations/interactions",
    tag = "recommendations",
    request_body = InteractionBatch,
    responses(
        (status = 201, description = "Interactions folded in", body = InteractionIngestResponse),
        (status = 400, description = "Empty batch")
    )
)]
pub async fn ingest_interactions(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<InteractionBatch>>,
) -> Result<(StatusCode, Json<InteractionIngestResponse>), AppError> {
    let outcome = recommendations_service::ingest_interactions(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Retrain the collaborative model. The body is optional.
#[utoipa::path(
    post,
    path = "/api/v1/recommendations/train",
    tag = "recommendations",
    request_body(content = Option<TrainingRequest>),
    responses(
        (status = 200, description = "Model trained", body = TrainingResponse),
        (status = 400, description = "Not enough interactions")
    )
)]
pub async fn train(
    State(state): State<SharedState>,
    payload: Option<Json<TrainingRequest>>,
) -> Result<Json<TrainingResponse>, AppError> {
    let request = match payload {
        Some(Json(request)) => {
            request.validate()?;
            request
        }
        None => TrainingRequest {
            persist: true,
            ..TrainingRequest::default()
        },
    };
    Ok(Json(recommendations_service::train(&state, request).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/recommendations/user/{user_id}/generate",
    tag = "recommendations",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    request_body = GenerationRequest,
    responses(
        (status = 200, description = "Generated batch", body = [RecommendationResponse]),
        (status = 404, description = "No candidates"),
        (status = 409, description = "Model not trained")
    )
)]
pub async fn generate(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<GenerationRequest>>,
) -> Result<Json<Vec<RecommendationResponse>>, AppError> {
    Ok(Json(
        recommendations_service::generate(&state, user_id, payload).await?,
    ))
}
