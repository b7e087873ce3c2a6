use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkshopItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub tags: Vec<String>,
    pub version: String,
    pub visibility: Visibility,
    pub status: ItemStatus,
    pub file_url: Option<String>,
    /// Local path of an uploaded file.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Hex SHA-256 of the uploaded file.
    #[serde(default)]
    pub file_checksum: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub auto_flagged: bool,
    pub auto_score: f64,
    pub auto_reasons: Vec<String>,
    pub manual_reviewer_id: Option<Uuid>,
    pub moderation_notes: Option<String>,
    pub downloads: u64,
    pub votes_up: u64,
    pub votes_down: u64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for WorkshopItem {
    const COLLECTION: &'static str = "workshop_items";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["slug"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkshopVote {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub is_upvote: bool,
    pub created_at: Millis,
}

impl Entity for WorkshopVote {
    const COLLECTION: &'static str = "workshop_votes";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["item_id", "user_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkshopComment {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: Millis,
}

impl Entity for WorkshopComment {
    const COLLECTION: &'static str = "workshop_comments";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkshopRating {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub score: u8,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for WorkshopRating {
    const COLLECTION: &'static str = "workshop_ratings";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["item_id", "user_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Audit trail of automatic and manual moderation decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkshopModerationLog {
    pub id: Uuid,
    pub item_id: Uuid,
    pub moderator_id: Option<Uuid>,
    pub action: String,
    pub notes: Option<String>,
    pub created_at: Millis,
}

impl Entity for WorkshopModerationLog {
    const COLLECTION: &'static str = "workshop_moderation_logs";

    fn id(&self) -> Uuid {
        self.id
    }
}
