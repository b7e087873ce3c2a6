use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    auth::require_admin_token,
    dto::catalog::{
        CreateGameRequest, GamePage, GameResponse, GameSearchParams, GenreRequest, GenreResponse,
        LimitParams, PlatformRequest, PlatformResponse, TagRequest, TagResponse,
        UpdateGameRequest,
    },
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

/// Catalog browsing plus admin-only catalog management.
pub fn router(state: SharedState) -> Router<SharedState> {
    let public = Router::new()
        .route("/games", get(search_games))
        .route("/games/featured", get(featured_games))
        .route("/games/new-releases", get(new_releases))
        .route("/games/on-sale", get(on_sale))
        .route("/games/by-slug/{slug}", get(get_game_by_slug))
        .route("/games/{id}", get(get_game))
        .route("/genres", get(list_genres))
        .route("/genres/{id}", get(get_genre))
        .route("/tags", get(list_tags))
        .route("/tags/{id}", get(get_tag))
        .route("/platforms", get(list_platforms))
        .route("/platforms/{id}", get(get_platform));

    let admin = Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", put(update_game).delete(delete_game))
        .route("/genres", post(create_genre))
        .route("/tags", post(create_tag))
        .route("/platforms", post(create_platform))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    public.merge(admin)
}

/// Add a game to the catalog.
#[utoipa::path(
    post,
    path = "/api/v1/catalog/games",
    tag = "catalog",
    security(("admin_token" = [])),
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameResponse),
        (status = 400, description = "Invalid payload or unknown genre/tag/platform"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    let game = catalog_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Search the catalog.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/games",
    tag = "catalog",
    params(GameSearchParams),
    responses((status = 200, description = "Matching games", body = GamePage))
)]
pub async fn search_games(
    State(state): State<SharedState>,
    Query(params): Query<GameSearchParams>,
) -> Result<Json<GamePage>, AppError> {
    Ok(Json(catalog_service::search_games(&state, params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/games/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game", body = GameResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(catalog_service::get_game(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/games/by-slug/{slug}",
    tag = "catalog",
    params(("slug" = String, Path, description = "URL slug")),
    responses(
        (status = 200, description = "Game", body = GameResponse),
        (status = 404, description = "Unknown slug")
    )
)]
pub async fn get_game_by_slug(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(catalog_service::get_game_by_slug(&state, &slug).await?))
}

/// Update a game; the discount is recomputed.
#[utoipa::path(
    put,
    path = "/api/v1/catalog/games/{id}",
    tag = "catalog",
    security(("admin_token" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = UpdateGameRequest,
    responses(
        (status = 200, description = "Updated game", body = GameResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn update_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateGameRequest>>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(catalog_service::update_game(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/catalog/games/{id}",
    tag = "catalog",
    security(("admin_token" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog_service::delete_game(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/games/featured",
    tag = "catalog",
    params(LimitParams),
    responses((status = 200, description = "Featured games", body = [GameResponse]))
)]
pub async fn featured_games(
    State(state): State<SharedState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<GameResponse>>, AppError> {
    Ok(Json(
        catalog_service::featured_games(&state, params.resolve()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/games/new-releases",
    tag = "catalog",
    params(LimitParams),
    responses((status = 200, description = "Recently released games", body = [GameResponse]))
)]
pub async fn new_releases(
    State(state): State<SharedState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<GameResponse>>, AppError> {
    Ok(Json(
        catalog_service::new_releases(&state, params.resolve()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/games/on-sale",
    tag = "catalog",
    params(LimitParams),
    responses((status = 200, description = "Discounted games", body = [GameResponse]))
)]
pub async fn on_sale(
    State(state): State<SharedState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<GameResponse>>, AppError> {
    Ok(Json(catalog_service::on_sale(&state, params.resolve()).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/catalog/genres",
    tag = "catalog",
    security(("admin_token" = [])),
    request_body = GenreRequest,
    responses(
        (status = 201, description = "Genre created", body = GenreResponse),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_genre(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GenreRequest>>,
) -> Result<(StatusCode, Json<GenreResponse>), AppError> {
    let genre = catalog_service::create_genre(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/genres",
    tag = "catalog",
    responses((status = 200, description = "Genres", body = [GenreResponse]))
)]
pub async fn list_genres(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GenreResponse>>, AppError> {
    Ok(Json(catalog_service::list_genres(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/genres/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Genre identifier")),
    responses(
        (status = 200, description = "Genre", body = GenreResponse),
        (status = 404, description = "Unknown genre")
    )
)]
pub async fn get_genre(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GenreResponse>, AppError> {
    Ok(Json(catalog_service::get_genre(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/catalog/tags",
    tag = "catalog",
    security(("admin_token" = [])),
    request_body = TagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_tag(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<TagRequest>>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    let tag = catalog_service::create_tag(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/tags",
    tag = "catalog",
    responses((status = 200, description = "Tags", body = [TagResponse]))
)]
pub async fn list_tags(State(state): State<SharedState>) -> Result<Json<Vec<TagResponse>>, AppError> {
    Ok(Json(catalog_service::list_tags(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/tags/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Tag identifier")),
    responses(
        (status = 200, description = "Tag", body = TagResponse),
        (status = 404, description = "Unknown tag")
    )
)]
pub async fn get_tag(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TagResponse>, AppError> {
    Ok(Json(catalog_service::get_tag(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/catalog/platforms",
    tag = "catalog",
    security(("admin_token" = [])),
    request_body = PlatformRequest,
    responses(
        (status = 201, description = "Platform created", body = PlatformResponse),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_platform(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PlatformRequest>>,
) -> Result<(StatusCode, Json<PlatformResponse>), AppError> {
    let platform = catalog_service::create_platform(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(platform)))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/platforms",
    tag = "catalog",
    responses((status = 200, description = "Platforms", body = [PlatformResponse]))
)]
pub async fn list_platforms(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PlatformResponse>>, AppError> {
    Ok(Json(catalog_service::list_platforms(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/platforms/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Platform identifier")),
    responses(
        (status = 200, description = "Platform", body = PlatformResponse),
        (status = 404, description = "Unknown platform")
    )
)]
pub async fn get_platform(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlatformResponse>, AppError> {
    Ok(Json(catalog_service::get_platform(&state, id).await?))
}
