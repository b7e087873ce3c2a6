use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::shopping::{
        AddCartItemRequest, AddWishlistItemRequest, CartResponse, CreateCartRequest,
        CreateWishlistRequest, UpdateCartItemRequest, WishlistResponse,
    },
    error::AppError,
    services::shopping_service,
    state::SharedState,
};

/// Cart and wishlist endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/cart", post(create_cart))
        .route("/cart/user/{user_id}", get(user_cart))
        .route(
            "/cart/items/{item_id}",
            patch(update_item).delete(remove_item),
        )
        .route("/cart/{id}", get(get_cart))
        .route("/cart/{id}/items", post(add_item))
        .route("/cart/{id}/clear", delete(clear_cart))
        .route("/wishlist", post(create_wishlist))
        .route("/wishlist/user/{user_id}", get(user_wishlists))
        .route("/wishlist/items/{item_id}", delete(remove_wishlist_item))
        .route("/wishlist/{id}", get(get_wishlist))
        .route("/wishlist/{id}/items", post(add_wishlist_item))
}

#[utoipa::path(
    post,
    path = "/api/v1/shopping/cart",
    tag = "shopping",
    request_body = CreateCartRequest,
    responses((status = 201, description = "Cart created", body = CartResponse))
)]
pub async fn create_cart(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateCartRequest>>,
) -> Result<(StatusCode, Json<CartResponse>), AppError> {
    let cart = shopping_service::create_cart(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shopping/cart/{id}",
    tag = "shopping",
    params(("id" = Uuid, Path, description = "Cart identifier")),
    responses(
        (status = 200, description = "Cart with items", body = CartResponse),
        (status = 404, description = "Unknown cart")
    )
)]
pub async fn get_cart(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CartResponse>, AppError> {
    Ok(Json(shopping_service::get_cart(&state, id).await?))
}

/// Newest active cart of a user.
#[utoipa::path(
    get,
    path = "/api/v1/shopping/cart/user/{user_id}",
    tag = "shopping",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Active cart", body = CartResponse),
        (status = 404, description = "No active cart")
    )
)]
pub async fn user_cart(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CartResponse>, AppError> {
    Ok(Json(shopping_service::user_cart(&state, user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/shopping/cart/{id}/items",
    tag = "shopping",
    params(("id" = Uuid, Path, description = "Cart identifier")),
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Unknown cart"),
        (status = 409, description = "Cart is not active")
    )
)]
pub async fn add_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddCartItemRequest>>,
) -> Result<Json<CartResponse>, AppError> {
    Ok(Json(shopping_service::add_item(&state, id, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/shopping/cart/items/{item_id}",
    tag = "shopping",
    params(("item_id" = Uuid, Path, description = "Cart item identifier")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Unknown item")
    )
)]
pub async fn update_item(
    State(state): State<SharedState>,
    Path(item_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateCartItemRequest>>,
) -> Result<Json<CartResponse>, AppError> {
    Ok(Json(
        shopping_service::update_item(&state, item_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shopping/cart/items/{item_id}",
    tag = "shopping",
    params(("item_id" = Uuid, Path, description = "Cart item identifier")),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Unknown item")
    )
)]
pub async fn remove_item(
    State(state): State<SharedState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CartResponse>, AppError> {
    Ok(Json(shopping_service::remove_item(&state, item_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shopping/cart/{id}/clear",
    tag = "shopping",
    params(("id" = Uuid, Path, description = "Cart identifier")),
    responses(
        (status = 200, description = "Emptied cart", body = CartResponse),
        (status = 404, description = "Unknown cart")
    )
)]
pub async fn clear_cart(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CartResponse>, AppError> {
    Ok(Json(shopping_service::clear_cart(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/shopping/wishlist",
    tag = "shopping",
    request_body = CreateWishlistRequest,
    responses((status = 201, description = "Wishlist created", body = WishlistResponse))
)]
pub async fn create_wishlist(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateWishlistRequest>>,
) -> Result<(StatusCode, Json<WishlistResponse>), AppError> {
    let wishlist = shopping_service::create_wishlist(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(wishlist)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shopping/wishlist/{id}",
    tag = "shopping",
    params(("id" = Uuid, Path, description = "Wishlist identifier")),
    responses(
        (status = 200, description = "Wishlist with items", body = WishlistResponse),
        (status = 404, description = "Unknown wishlist")
    )
)]
pub async fn get_wishlist(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WishlistResponse>, AppError> {
    Ok(Json(shopping_service::get_wishlist(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/shopping/wishlist/user/{user_id}",
    tag = "shopping",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses((status = 200, description = "Wishlists of the user", body = [WishlistResponse]))
)]
pub async fn user_wishlists(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<WishlistResponse>>, AppError> {
    Ok(Json(
        shopping_service::user_wishlists(&state, user_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/shopping/wishlist/{id}/items",
    tag = "shopping",
    params(("id" = Uuid, Path, description = "Wishlist identifier")),
    request_body = AddWishlistItemRequest,
    responses(
        (status = 200, description = "Wishlist with items", body = WishlistResponse),
        (status = 404, description = "Unknown wishlist")
    )
)]
pub async fn add_wishlist_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddWishlistItemRequest>>,
) -> Result<Json<WishlistResponse>, AppError> {
    Ok(Json(
        shopping_service::add_wishlist_item(&state, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shopping/wishlist/items/{item_id}",
    tag = "shopping",
    params(("item_id" = Uuid, Path, description = "Wishlist item identifier")),
    responses(
        (status = 204, description = "Item removed"),
        (status = 404, description = "Unknown item")
    )
)]
pub async fn remove_wishlist_item(
    State(state): State<SharedState>,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    shopping_service::remove_wishlist_item(&state, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
