use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::notifications::{
        CreateNotificationRequest, MarkReadRequest, NotificationListParams, NotificationResponse,
    },
    error::AppError,
    services::notifications_service,
    state::SharedState,
};

/// In-app notification inbox.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_notification))
        .route("/user/{user_id}", get(user_notifications))
        .route("/{id}/read", post(mark_read))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "notifications",
    request_body = CreateNotificationRequest,
    responses((status = 201, description = "Notification stored", body = NotificationResponse))
)]
pub async fn create_notification(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateNotificationRequest>>,
) -> Result<(StatusCode, Json<NotificationResponse>), AppError> {
    let notification = notifications_service::create_notification(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/user/{user_id}",
    tag = "notifications",
    params(("user_id" = Uuid, Path, description = "User identifier"), NotificationListParams),
    responses((status = 200, description = "Notifications, newest first", body = [NotificationResponse]))
)]
pub async fn user_notifications(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<NotificationListParams>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    Ok(Json(
        notifications_service::user_notifications(&state, user_id, params.only_unread, limit)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification identifier")),
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Updated notification", body = NotificationResponse),
        (status = 404, description = "Unknown notification")
    )
)]
pub async fn mark_read(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<Json<NotificationResponse>, AppError> {
    Ok(Json(
        notifications_service::mark_read(&state, id, payload.is_read).await?,
    ))
}
