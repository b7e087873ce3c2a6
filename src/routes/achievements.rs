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
        achievements::{
            AchievementResponse, CreateAchievementRequest, LeaderboardParams,
            LeaderboardResponse, ProgressRequest, ProgressResponse, UpdateAchievementRequest,
            UserOverview,
        },
    },
    error::AppError,
    services::achievements_service,
    state::SharedState,
};

/// Achievement definitions, user progress and the points leaderboard.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/achievements",
            get(list_achievements).post(create_achievement),
        )
        .route(
            "/achievements/{code}",
            get(get_achievement).patch(update_achievement),
        )
        .route("/users/{user_id}/progress", post(record_progress))
        .route("/users/{user_id}/overview", get(user_overview))
        .route("/leaderboard", get(leaderboard))
}

#[utoipa::path(
    post,
    path = "/api/v1/achievements/achievements",
    tag = "achievements",
    request_body = CreateAchievementRequest,
    responses(
        (status = 201, description = "Achievement defined", body = AchievementResponse),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn create_achievement(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateAchievementRequest>>,
) -> Result<(StatusCode, Json<AchievementResponse>), AppError> {
    let achievement = achievements_service::create_achievement(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(achievement)))
}

#[utoipa::path(
    get,
    path = "/api/v1/achievements/achievements",
    tag = "achievements",
    params(SkipLimit),
    responses((status = 200, description = "Achievements, newest first", body = [AchievementResponse]))
)]
pub async fn list_achievements(
    State(state): State<SharedState>,
    Query(paging): Query<SkipLimit>,
) -> Result<Json<Vec<AchievementResponse>>, AppError> {
    Ok(Json(
        achievements_service::list_achievements(&state, paging).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/achievements/achievements/{code}",
    tag = "achievements",
    params(("code" = String, Path, description = "Achievement code")),
    responses(
        (status = 200, description = "Achievement", body = AchievementResponse),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn get_achievement(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<AchievementResponse>, AppError> {
    Ok(Json(
        achievements_service::get_achievement(&state, &code).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/v1/achievements/achievements/{code}",
    tag = "achievements",
    params(("code" = String, Path, description = "Achievement code")),
    request_body = UpdateAchievementRequest,
    responses(
        (status = 200, description = "Updated achievement", body = AchievementResponse),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn update_achievement(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<UpdateAchievementRequest>>,
) -> Result<Json<AchievementResponse>, AppError> {
    Ok(Json(
        achievements_service::update_achievement(&state, &code, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/achievements/users/{user_id}/progress",
    tag = "achievements",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Progress applied", body = ProgressResponse),
        (status = 404, description = "Unknown achievement code")
    )
)]
pub async fn record_progress(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ProgressRequest>>,
) -> Result<Json<ProgressResponse>, AppError> {
    Ok(Json(
        achievements_service::record_progress(&state, user_id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/achievements/users/{user_id}/overview",
    tag = "achievements",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses((status = 200, description = "Score and progress of the user", body = UserOverview))
)]
pub async fn user_overview(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserOverview>, AppError> {
    Ok(Json(
        achievements_service::user_overview(&state, user_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/achievements/leaderboard",
    tag = "achievements",
    params(LeaderboardParams),
    responses((status = 200, description = "Players ranked by points", body = LeaderboardResponse))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(achievements_service::leaderboard(&state, params).await?))
}
