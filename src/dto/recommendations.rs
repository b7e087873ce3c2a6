use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::recommendations::{FeedbackAction, Recommendation, RecommendationFeedback},
    dto::{format_millis, format_opt_millis},
};

fn default_algorithm() -> String {
    "hybrid".into()
}

fn default_generated_algorithm() -> String {
    "collaborative".into()
}

fn default_generated_reason() -> Option<String> {
    Some("Because you liked similar games".into())
}

fn default_generate_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct RecommendationItem {
    pub game_id: Uuid,
    #[validate(range(min = 0.0))]
    pub score: f64,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

/// Replaces the active recommendations of a user.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecommendationBatchRequest {
    pub user_id: Uuid,
    #[validate(nested)]
    pub recommendations: Vec<RecommendationItem>,
    #[validate(range(min = 1))]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub score: f64,
    pub rank: u32,
    pub algorithm: String,
    pub reason: Option<String>,
    pub context: Value,
    pub is_active: bool,
    pub expires_at: Option<String>,
    pub created_at: String,
}

impl From<Recommendation> for RecommendationResponse {
    fn from(recommendation: Recommendation) -> Self {
        Self {
            id: recommendation.id,
            user_id: recommendation.user_id,
            game_id: recommendation.game_id,
            score: recommendation.score,
            rank: recommendation.rank,
            algorithm: recommendation.algorithm,
            reason: recommendation.reason,
            context: recommendation.context,
            is_active: recommendation.is_active,
            expires_at: format_opt_millis(recommendation.expires_at),
            created_at: format_millis(recommendation.created_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecommendationListParams {
    /// Maximum number of recommendations (1..=50, default 20).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    /// Resolved from the active recommendation for `user_id`/`game_id` when omitted.
    pub recommendation_id: Option<Uuid>,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub action: FeedbackAction,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub recommendation_id: Option<Uuid>,
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub action: FeedbackAction,
    pub details: Value,
    pub created_at: String,
}

impl From<RecommendationFeedback> for FeedbackResponse {
    fn from(feedback: RecommendationFeedback) -> Self {
        Self {
            id: feedback.id,
            recommendation_id: feedback.recommendation_id,
            user_id: feedback.user_id,
            game_id: feedback.game_id,
            action: feedback.action,
            details: feedback.details,
            created_at: format_millis(feedback.created_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct InteractionEvent {
    pub user_id: Uuid,
    pub game_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub event_type: String,
    #[validate(range(min = 0.0))]
    pub weight: Option<f64>,
    /// RFC 3339 timestamp; defaults to now.
    pub occurred_at: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct InteractionBatch {
    #[validate(nested)]
    pub interactions: Vec<InteractionEvent>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct InteractionIngestResponse {
    pub created: u64,
    pub updated: u64,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct TrainingRequest {
    #[validate(range(min = 1))]
    pub min_interactions: Option<usize>,
    #[validate(range(min = 2, max = 200))]
    pub n_components: Option<usize>,
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainingResponse {
    pub interactions: usize,
    pub users: usize,
    pub games: usize,
    pub components: usize,
    pub trained_at: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GenerationRequest {
    #[serde(default = "default_generate_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
    #[serde(default = "default_generated_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_generated_reason")]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            limit: default_generate_limit(),
            algorithm: default_generated_algorithm(),
            reason: default_generated_reason(),
        }
    }
}
