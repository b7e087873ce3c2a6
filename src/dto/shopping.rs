use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::shopping::{
        CartItem, CartStatus, MAX_LINE_QUANTITY, MAX_UNIT_PRICE, ShoppingCart, Wishlist,
        WishlistItem,
    },
    dto::{format_millis, validation::validate_currency},
};

fn default_currency() -> String {
    "USD".into()
}

fn default_quantity() -> i64 {
    1
}

fn default_wishlist_name() -> String {
    "My Wishlist".into()
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCartRequest {
    pub user_id: Uuid,
    #[serde(default = "default_currency")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddCartItemRequest {
    pub game_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub game_name: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = MAX_LINE_QUANTITY))]
    pub quantity: i64,
    /// Unit price in cents.
    #[validate(range(min = 0, max = MAX_UNIT_PRICE))]
    pub unit_price: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_UNIT_PRICE))]
    pub discount_amount: i64,
}

/// Quantity 0 removes the line.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0, max = MAX_LINE_QUANTITY))]
    pub quantity: i64,
    #[validate(range(min = 0, max = MAX_UNIT_PRICE))]
    pub discount_amount: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub game_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub discount_amount: i64,
    pub total_price: i64,
    pub created_at: String,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id,
            game_id: item.game_id,
            game_name: item.game_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount_amount: item.discount_amount,
            total_price: item.total_price,
            created_at: format_millis(item.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: CartStatus,
    pub currency: String,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub items: Vec<CartItemResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl CartResponse {
    pub fn new(cart: ShoppingCart, items: Vec<CartItem>) -> Self {
        Self {
            id: cart.id,
            user_id: cart.user_id,
            status: cart.status,
            currency: cart.currency,
            subtotal: cart.subtotal,
            discount_amount: cart.discount_amount,
            tax_amount: cart.tax_amount,
            total_amount: cart.total_amount,
            items: items.into_iter().map(Into::into).collect(),
            created_at: format_millis(cart.created_at),
            updated_at: format_millis(cart.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateWishlistRequest {
    pub user_id: Uuid,
    #[serde(default = "default_wishlist_name")]
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddWishlistItemRequest {
    pub game_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub game_name: String,
    #[validate(range(min = 0))]
    pub price_when_added: Option<i64>,
    #[serde(default = "default_currency")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistItemResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub game_name: String,
    pub price_when_added: Option<i64>,
    pub currency: String,
    pub created_at: String,
}

impl From<WishlistItem> for WishlistItemResponse {
    fn from(item: WishlistItem) -> Self {
        Self {
            id: item.id,
            game_id: item.game_id,
            game_name: item.game_name,
            price_when_added: item.price_when_added,
            currency: item.currency,
            created_at: format_millis(item.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub items: Vec<WishlistItemResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl WishlistResponse {
    pub fn new(wishlist: Wishlist, items: Vec<WishlistItem>) -> Self {
        Self {
            id: wishlist.id,
            user_id: wishlist.user_id,
            name: wishlist.name,
            description: wishlist.description,
            is_public: wishlist.is_public,
            items: items.into_iter().map(Into::into).collect(),
            created_at: format_millis(wishlist.created_at),
            updated_at: format_millis(wishlist.updated_at),
        }
    }
}
