use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::health::{HealthResponse, ServiceInfo},
    services::health_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Storage status and mounted domains", body = HealthResponse))
)]
/// Return the current health status, probing the storage backend.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state).await)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses((status = 200, description = "Service name, version and mounted prefixes", body = ServiceInfo))
)]
pub async fn service_info(State(state): State<SharedState>) -> Json<ServiceInfo> {
    Json(health_service::service_info(&state))
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/health", get(healthcheck))
        .route("/", get(service_info))
}
