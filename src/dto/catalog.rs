use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::catalog::{Game, GameStatus, Genre, Platform, Tag},
    dto::{format_millis, format_opt_millis, validation::validate_currency},
};

fn default_currency() -> String {
    "USD".into()
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    #[validate(length(max = 255))]
    pub developer: Option<String>,
    #[validate(length(max = 255))]
    pub publisher: Option<String>,
    /// Price in cents.
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub original_price: Option<i64>,
    #[serde(default = "default_currency")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
    #[serde(default)]
    pub status: GameStatus,
    /// RFC 3339 release timestamp.
    pub release_date: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub genre_ids: Vec<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    #[serde(default)]
    pub platform_ids: Vec<Uuid>,
    #[validate(url)]
    pub header_image_url: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateGameRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub original_price: Option<i64>,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
    pub status: Option<GameStatus>,
    pub release_date: Option<String>,
    pub is_featured: Option<bool>,
    pub genre_ids: Option<Vec<Uuid>>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub platform_ids: Option<Vec<Uuid>>,
    #[validate(url)]
    pub header_image_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GameResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub price: i64,
    pub original_price: Option<i64>,
    pub discount_percent: u8,
    pub currency: String,
    pub status: GameStatus,
    pub release_date: Option<String>,
    pub is_featured: bool,
    pub genre_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub platform_ids: Vec<Uuid>,
    pub header_image_url: Option<String>,
    pub average_rating: f64,
    pub total_reviews: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Game> for GameResponse {
    fn from(game: Game) -> Self {
        Self {
            id: game.id,
            title: game.title,
            slug: game.slug,
            description: game.description,
            short_description: game.short_description,
            developer: game.developer,
            publisher: game.publisher,
            price: game.price,
            original_price: game.original_price,
            discount_percent: game.discount_percent,
            currency: game.currency,
            status: game.status,
            release_date: format_opt_millis(game.release_date),
            is_featured: game.is_featured,
            genre_ids: game.genre_ids,
            tag_ids: game.tag_ids,
            platform_ids: game.platform_ids,
            header_image_url: game.header_image_url,
            average_rating: game.average_rating,
            total_reviews: game.total_reviews,
            created_at: format_millis(game.created_at),
            updated_at: format_millis(game.updated_at),
        }
    }
}

/// Ordering of catalog search results.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Title,
    Rating,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GameSearchParams {
    /// Case-insensitive match on title, description, developer and publisher.
    pub q: Option<String>,
    pub genre_id: Option<Uuid>,
    pub tag_id: Option<Uuid>,
    pub platform_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Only games with a running discount.
    pub on_sale: Option<bool>,
    pub sort: Option<GameSort>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GamePage {
    pub items: Vec<GameResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Maximum number of games to return (1..=50, default 10).
    pub limit: Option<u64>,
}

impl LimitParams {
    pub fn resolve(&self) -> u64 {
        self.limit.unwrap_or(10).clamp(1, 50)
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GenreRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenreResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<Genre> for GenreResponse {
    fn from(genre: Genre) -> Self {
        Self {
            id: genre.id,
            name: genre.name,
            description: genre.description,
            created_at: format_millis(genre.created_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TagRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 50))]
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub created_at: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            category: tag.category,
            created_at: format_millis(tag.created_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlatformRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlatformResponse {
    pub id: Uuid,
    pub name: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl From<Platform> for PlatformResponse {
    fn from(platform: Platform) -> Self {
        Self {
            id: platform.id,
            name: platform.name,
            display_name: platform.display_name,
            created_at: format_millis(platform.created_at),
        }
    }
}
