use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Approved,
    Pending,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub rating: u8,
    pub is_positive: bool,
    pub status: ReviewStatus,
    pub playtime_hours: Option<f64>,
    pub helpful_votes: u64,
    pub unhelpful_votes: u64,
    pub total_votes: u64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for Review {
    const COLLECTION: &'static str = "reviews";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id", "game_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewComment {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
    pub created_at: Millis,
}

impl Entity for ReviewComment {
    const COLLECTION: &'static str = "review_comments";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewVote {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub is_helpful: bool,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for ReviewVote {
    const COLLECTION: &'static str = "review_votes";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["review_id", "user_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
