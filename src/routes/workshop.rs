use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, require_admin_token},
    dto::workshop::{
        CommentListParams, CommentResponse, CreateCommentRequest, CreateItemRequest,
        DownloadResponse, ItemListParams, ItemPage, ItemResponse, ModerationRequest,
        RatingRequest, RatingSummary, UpdateItemRequest, UploadItemForm, VoteRequest,
    },
    error::AppError,
    services::{
        workshop_service,
        workshop_storage::{StoredFile, UploadError, UploadSink, discard},
    },
    state::SharedState,
};

/// Multipart overhead allowed on top of the file size limit.
const FORM_OVERHEAD: u64 = 1024 * 1024;

/// User-generated content. Moderation, deletion and reset require the admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    let body_limit = state
        .config()
        .workshop
        .max_file_bytes
        .saturating_add(FORM_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let public = Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/upload",
            post(upload_item).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/items/{id}",
            get(get_item).put(update_item).merge(
                delete(delete_item).route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_admin_token,
                )),
            ),
        )
        .route("/items/{id}/votes", post(vote))
        .route("/items/{id}/download", post(record_download))
        .route("/items/{id}/comments", get(list_comments).post(add_comment))
        .route("/items/{id}/ratings", get(rating_summary).post(rate));

    let admin = Router::new()
        .route("/items/{id}/moderation", post(moderate))
        .route("/admin/reset", post(reset))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    public.merge(admin)
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items",
    tag = "workshop",
    security(("bearer" = [])),
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item published (pending when auto-flagged)", body = ItemResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_item(
    State(state): State<SharedState>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<CreateItemRequest>>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    let item = workshop_service::create_item(&state, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

fn bad_form(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
}

fn upload_failed(err: UploadError) -> AppError {
    match err {
        UploadError::TooLarge(_) => AppError::PayloadTooLarge(err.to_string()),
        UploadError::Io(_) => AppError::Internal(err.to_string()),
    }
}

/// Stream the `file` field to local storage.
async fn store_file(
    state: &SharedState,
    field: &mut axum::extract::multipart::Field<'_>,
) -> Result<StoredFile, AppError> {
    let settings = &state.config().workshop;
    let filename = field.file_name().unwrap_or_default().to_owned();
    let mut sink = UploadSink::create(&settings.storage_path, &filename, settings.max_file_bytes)
        .await
        .map_err(upload_failed)?;
    loop {
        let written = match field.chunk().await {
            Ok(Some(chunk)) => sink.write(&chunk).await.map_err(upload_failed),
            Ok(None) => break,
            Err(err) => Err(bad_form(err)),
        };
        if let Err(err) = written {
            sink.abort().await;
            return Err(err);
        }
    }
    sink.finish().await.map_err(upload_failed)
}

async fn read_upload_form(
    state: &SharedState,
    multipart: &mut Multipart,
    metadata: &mut Option<String>,
    file: &mut Option<StoredFile>,
) -> Result<(), AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "metadata" => *metadata = Some(field.text().await.map_err(bad_form)?),
            "file" if file.is_none() => *file = Some(store_file(state, &mut field).await?),
            _ => {}
        }
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items/upload",
    tag = "workshop",
    security(("bearer" = [])),
    request_body(content = UploadItemForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Item published with its file stored locally", body = ItemResponse),
        (status = 400, description = "Invalid metadata or form"),
        (status = 413, description = "File exceeds the upload limit"),
        (status = 422, description = "Missing metadata or file field")
    )
)]
pub async fn upload_item(
    State(state): State<SharedState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    let mut metadata = None;
    let mut file = None;
    let read = read_upload_form(&state, &mut multipart, &mut metadata, &mut file).await;
    let (metadata, file) = match (read, metadata, file) {
        (Ok(()), Some(metadata), Some(file)) => (metadata, file),
        (outcome, _, stored) => {
            if let Some(stored) = stored {
                discard(&stored.path).await;
            }
            outcome?;
            return Err(AppError::Unprocessable(
                "multipart form needs `metadata` and `file` fields".into(),
            ));
        }
    };
    let item =
        workshop_service::create_item_with_upload(&state, auth.user_id, &metadata, file).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/api/v1/workshop/items",
    tag = "workshop",
    params(ItemListParams),
    responses((status = 200, description = "Items, newest first", body = ItemPage))
)]
pub async fn list_items(
    State(state): State<SharedState>,
    Query(params): Query<ItemListParams>,
) -> Result<Json<ItemPage>, AppError> {
    Ok(Json(workshop_service::list_items(&state, params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/workshop/items/{id}",
    tag = "workshop",
    params(("id" = Uuid, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "Item with rating and comment counts", body = ItemResponse),
        (status = 404, description = "Unknown item")
    )
)]
pub async fn get_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemResponse>, AppError> {
    Ok(Json(workshop_service::get_item(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/workshop/items/{id}",
    tag = "workshop",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Item identifier")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated item", body = ItemResponse),
        (status = 403, description = "Caller is not the owner")
    )
)]
pub async fn update_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<UpdateItemRequest>>,
) -> Result<Json<ItemResponse>, AppError> {
    Ok(Json(
        workshop_service::update_item(&state, id, auth.user_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/workshop/items/{id}",
    tag = "workshop",
    security(("admin_token" = [])),
    params(("id" = Uuid, Path, description = "Item identifier")),
    responses(
        (status = 204, description = "Item removed with its votes, comments and ratings"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn delete_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    workshop_service::delete_item(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items/{id}/votes",
    tag = "workshop",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Item identifier")),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded", body = ItemResponse))
)]
pub async fn vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ItemResponse>, AppError> {
    Ok(Json(
        workshop_service::vote(&state, id, auth.user_id, payload.is_upvote).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items/{id}/download",
    tag = "workshop",
    params(("id" = Uuid, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "Download counted; empty URL when no file is attached", body = DownloadResponse),
        (status = 404, description = "Unknown item")
    )
)]
pub async fn record_download(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, AppError> {
    Ok(Json(workshop_service::record_download(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items/{id}/moderation",
    tag = "workshop",
    security(("admin_token" = [])),
    params(("id" = Uuid, Path, description = "Item identifier")),
    request_body = ModerationRequest,
    responses(
        (status = 200, description = "Decision applied", body = ItemResponse),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn moderate(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ModerationRequest>>,
) -> Result<Json<ItemResponse>, AppError> {
    Ok(Json(workshop_service::moderate(&state, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items/{id}/comments",
    tag = "workshop",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Item identifier")),
    request_body = CreateCommentRequest,
    responses((status = 201, description = "Comment added", body = CommentResponse))
)]
pub async fn add_comment(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<CreateCommentRequest>>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = workshop_service::add_comment(&state, id, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/workshop/items/{id}/comments",
    tag = "workshop",
    params(("id" = Uuid, Path, description = "Item identifier"), CommentListParams),
    responses((status = 200, description = "Comments, oldest first", body = [CommentResponse]))
)]
pub async fn list_comments(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CommentListParams>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    Ok(Json(
        workshop_service::list_comments(&state, id, params.offset.unwrap_or(0), limit).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/items/{id}/ratings",
    tag = "workshop",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Item identifier")),
    request_body = RatingRequest,
    responses((status = 200, description = "Rating stored", body = RatingSummary))
)]
pub async fn rate(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<RatingRequest>>,
) -> Result<Json<RatingSummary>, AppError> {
    Ok(Json(
        workshop_service::rate(&state, id, auth.user_id, payload.score).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/workshop/items/{id}/ratings",
    tag = "workshop",
    params(("id" = Uuid, Path, description = "Item identifier")),
    responses((status = 200, description = "Rating summary", body = RatingSummary))
)]
pub async fn rating_summary(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RatingSummary>, AppError> {
    Ok(Json(workshop_service::rating_summary(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/workshop/admin/reset",
    tag = "workshop",
    security(("admin_token" = [])),
    responses(
        (status = 204, description = "Workshop wiped"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn reset(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    workshop_service::reset(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}
