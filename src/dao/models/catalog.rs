use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

/// Publication state of a catalog entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Released,
    EarlyAccess,
    ComingSoon,
    Delisted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    /// Current price in cents.
    pub price: i64,
    pub original_price: Option<i64>,
    pub discount_percent: u8,
    pub currency: String,
    pub status: GameStatus,
    pub release_date: Option<Millis>,
    pub is_featured: bool,
    pub genre_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub platform_ids: Vec<Uuid>,
    pub header_image_url: Option<String>,
    pub average_rating: f64,
    pub total_reviews: u64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Game {
    /// Recompute the advertised discount from the original price.
    pub fn refresh_discount(&mut self) {
        self.discount_percent = match self.original_price {
            Some(original) if original > 0 && original > self.price => {
                (((original - self.price) * 100 + original / 2) / original).clamp(0, 100) as u8
            }
            _ => 0,
        };
    }
}

impl Entity for Game {
    const COLLECTION: &'static str = "games";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["slug"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Millis,
}

impl Entity for Genre {
    const COLLECTION: &'static str = "genres";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["name"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub created_at: Millis,
}

impl Entity for Tag {
    const COLLECTION: &'static str = "tags";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["name"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Platform {
    pub id: Uuid,
    pub name: String,
    pub display_name: Option<String>,
    pub created_at: Millis,
}

impl Entity for Platform {
    const COLLECTION: &'static str = "platforms";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["name"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
