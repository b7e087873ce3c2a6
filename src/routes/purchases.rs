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
        purchases::{
            CreatePurchaseRequest, CreateRefundRequest, PurchaseResponse, RefundResponse,
            UpdatePurchaseRequest,
        },
    },
    error::AppError,
    services::purchases_service,
    state::SharedState,
};

/// Purchase records and refund requests.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_purchase))
        .route("/refunds", post(request_refund))
        .route("/refunds/user/{user_id}", get(user_refunds))
        .route("/refunds/{id}", get(get_refund))
        .route("/user/{user_id}", get(user_purchases))
        .route("/{id}", get(get_purchase).patch(update_purchase))
}

#[utoipa::path(
    post,
    path = "/api/v1/purchases",
    tag = "purchases",
    request_body = CreatePurchaseRequest,
    responses(
        (status = 201, description = "Pending purchase recorded", body = PurchaseResponse),
        (status = 400, description = "Total does not match the items")
    )
)]
pub async fn create_purchase(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreatePurchaseRequest>>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let purchase = purchases_service::create_purchase(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}",
    tag = "purchases",
    params(("id" = Uuid, Path, description = "Purchase identifier")),
    responses(
        (status = 200, description = "Purchase", body = PurchaseResponse),
        (status = 404, description = "Unknown purchase")
    )
)]
pub async fn get_purchase(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseResponse>, AppError> {
    Ok(Json(purchases_service::get_purchase(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/user/{user_id}",
    tag = "purchases",
    params(("user_id" = Uuid, Path, description = "User identifier"), SkipLimit),
    responses((status = 200, description = "Purchases, newest first", body = [PurchaseResponse]))
)]
pub async fn user_purchases(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(paging): Query<SkipLimit>,
) -> Result<Json<Vec<PurchaseResponse>>, AppError> {
    let (skip, limit) = paging.resolve(50, 100);
    Ok(Json(
        purchases_service::user_purchases(&state, user_id, skip, limit).await?,
    ))
}

/// Change payment details or advance the purchase status.
#[utoipa::path(
    patch,
    path = "/api/v1/purchases/{id}",
    tag = "purchases",
    params(("id" = Uuid, Path, description = "Purchase identifier")),
    request_body = UpdatePurchaseRequest,
    responses(
        (status = 200, description = "Updated purchase", body = PurchaseResponse),
        (status = 404, description = "Unknown purchase"),
        (status = 409, description = "Status transition not allowed")
    )
)]
pub async fn update_purchase(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    Ok(Json(
        purchases_service::update_purchase(&state, id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/purchases/refunds",
    tag = "purchases",
    request_body = CreateRefundRequest,
    responses(
        (status = 201, description = "Refund requested", body = RefundResponse),
        (status = 404, description = "Unknown purchase")
    )
)]
pub async fn request_refund(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRefundRequest>>,
) -> Result<(StatusCode, Json<RefundResponse>), AppError> {
    let refund = purchases_service::request_refund(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/refunds/{id}",
    tag = "purchases",
    params(("id" = Uuid, Path, description = "Refund identifier")),
    responses(
        (status = 200, description = "Refund", body = RefundResponse),
        (status = 404, description = "Unknown refund")
    )
)]
pub async fn get_refund(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundResponse>, AppError> {
    Ok(Json(purchases_service::get_refund(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/refunds/user/{user_id}",
    tag = "purchases",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses((status = 200, description = "Refunds of the user", body = [RefundResponse]))
)]
pub async fn user_refunds(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<RefundResponse>>, AppError> {
    Ok(Json(purchases_service::user_refunds(&state, user_id).await?))
}
