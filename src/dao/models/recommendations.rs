use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub score: f64,
    pub rank: u32,
    pub algorithm: String,
    pub reason: Option<String>,
    pub context: Value,
    pub is_active: bool,
    pub expires_at: Option<Millis>,
    pub created_at: Millis,
}

impl Entity for Recommendation {
    const COLLECTION: &'static str = "recommendations";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Clicked,
    Ignored,
    Wishlisted,
    Purchased,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationFeedback {
    pub id: Uuid,
    pub recommendation_id: Option<Uuid>,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub action: FeedbackAction,
    pub details: Value,
    pub created_at: Millis,
}

impl Entity for RecommendationFeedback {
    const COLLECTION: &'static str = "recommendation_feedback";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Accumulated implicit signal between one user and one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserGameInteraction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub score: f64,
    pub interactions: u64,
    pub last_event_type: String,
    pub last_event_at: Millis,
    pub created_at: Millis,
}

impl Entity for UserGameInteraction {
    const COLLECTION: &'static str = "user_game_interactions";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id", "game_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
