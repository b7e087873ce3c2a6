use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::payments::{
        ChargeResponse, CreateChargeRequest, CreateIntentRequest, CreatePaymentRefundRequest,
        IntentResponse, PaymentRefundResponse,
    },
    error::AppError,
    services::payments_service,
    state::SharedState,
};

/// Payment intents, captures and refunds against a test gateway.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/intents", post(create_intent))
        .route("/intents/{id}", get(get_intent))
        .route("/charges", post(create_charge))
        .route("/refunds", post(create_refund))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/intents",
    tag = "payments",
    request_body = CreateIntentRequest,
    responses((status = 201, description = "Intent created", body = IntentResponse))
)]
pub async fn create_intent(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateIntentRequest>>,
) -> Result<(StatusCode, Json<IntentResponse>), AppError> {
    let intent = payments_service::create_intent(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/intents/{id}",
    tag = "payments",
    params(("id" = Uuid, Path, description = "Intent identifier")),
    responses(
        (status = 200, description = "Intent", body = IntentResponse),
        (status = 404, description = "Unknown intent")
    )
)]
pub async fn get_intent(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IntentResponse>, AppError> {
    Ok(Json(payments_service::get_intent(&state, id).await?))
}

/// Capture a payment intent.
#[utoipa::path(
    post,
    path = "/api/v1/payments/charges",
    tag = "payments",
    request_body = CreateChargeRequest,
    responses(
        (status = 201, description = "Charge succeeded", body = ChargeResponse),
        (status = 404, description = "Unknown intent"),
        (status = 409, description = "Intent expired or already paid")
    )
)]
pub async fn create_charge(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateChargeRequest>>,
) -> Result<(StatusCode, Json<ChargeResponse>), AppError> {
    let charge = payments_service::create_charge(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(charge)))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/refunds",
    tag = "payments",
    request_body = CreatePaymentRefundRequest,
    responses(
        (status = 201, description = "Refund pending", body = PaymentRefundResponse),
        (status = 400, description = "Amount exceeds the charge"),
        (status = 404, description = "Unknown charge")
    )
)]
pub async fn create_refund(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreatePaymentRefundRequest>>,
) -> Result<(StatusCode, Json<PaymentRefundResponse>), AppError> {
    let refund = payments_service::create_refund(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}
