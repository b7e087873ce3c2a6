use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::achievements::{Achievement, UserAchievement, UserScore},
    dto::{format_millis, format_opt_millis},
};

fn default_points() -> u32 {
    50
}

fn default_target() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_delta() -> u32 {
    1
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateAchievementRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default = "default_points")]
    #[validate(range(max = 10_000))]
    pub points: u32,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    #[validate(length(max = 30))]
    pub rarity: Option<String>,
    #[validate(url)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default = "default_target")]
    #[validate(range(min = 1))]
    pub progress_target: u32,
    #[serde(default = "default_true")]
    pub auto_claim: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateAchievementRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(max = 10_000))]
    pub points: Option<u32>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    #[validate(length(max = 30))]
    pub rarity: Option<String>,
    #[validate(url)]
    pub icon_url: Option<String>,
    pub is_secret: Option<bool>,
    #[validate(range(min = 1))]
    pub progress_target: Option<u32>,
    pub auto_claim: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AchievementResponse {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub points: u32,
    pub category: Option<String>,
    pub rarity: Option<String>,
    pub icon_url: Option<String>,
    pub is_secret: bool,
    pub progress_target: u32,
    pub auto_claim: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Achievement> for AchievementResponse {
    fn from(achievement: Achievement) -> Self {
        Self {
            id: achievement.id,
            code: achievement.code,
            title: achievement.title,
            description: achievement.description,
            points: achievement.points,
            category: achievement.category,
            rarity: achievement.rarity,
            icon_url: achievement.icon_url,
            is_secret: achievement.is_secret,
            progress_target: achievement.progress_target,
            auto_claim: achievement.auto_claim,
            created_at: format_millis(achievement.created_at),
            updated_at: format_millis(achievement.updated_at),
        }
    }
}

/// External trigger moving a user towards an achievement.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProgressRequest {
    #[validate(length(min = 1, max = 64))]
    pub achievement_code: String,
    #[serde(default = "default_delta")]
    #[validate(range(max = 100_000))]
    pub progress_delta: u32,
    #[serde(default)]
    #[validate(range(max = 5_000))]
    pub score_bonus: u32,
    #[serde(default)]
    pub force_complete: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default = "default_true")]
    pub notify: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AchievementProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_code: String,
    pub achievement_title: String,
    pub progress_current: u32,
    pub progress_target: u32,
    pub is_completed: bool,
    pub unlocked_at: Option<String>,
    pub reward_points: u32,
    pub progress_percent: f64,
}

impl AchievementProgress {
    pub fn new(progress: &UserAchievement, achievement: &Achievement) -> Self {
        Self {
            id: progress.id,
            user_id: progress.user_id,
            achievement_code: achievement.code.clone(),
            achievement_title: achievement.title.clone(),
            progress_current: progress.progress_current,
            progress_target: progress.progress_target,
            is_completed: progress.is_completed,
            unlocked_at: format_opt_millis(progress.unlocked_at),
            reward_points: progress.reward_points,
            progress_percent: progress.progress_percent(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserScoreResponse {
    pub user_id: Uuid,
    pub total_points: i64,
    pub achievements_unlocked: u32,
    pub star_tokens: u32,
    pub leaderboard_rank: Option<u64>,
}

impl UserScoreResponse {
    pub fn new(score: &UserScore, leaderboard_rank: Option<u64>) -> Self {
        Self {
            user_id: score.user_id,
            total_points: score.total_points,
            achievements_unlocked: score.achievements_unlocked,
            star_tokens: score.star_tokens,
            leaderboard_rank,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub user: UserScoreResponse,
    pub achievement: AchievementProgress,
    pub star_tokens_awarded: u32,
    pub score_delta: i64,
    pub leaderboard_score: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserOverview {
    pub user: UserScoreResponse,
    pub achievements: Vec<AchievementProgress>,
    /// Five most recent unlocks, newest first.
    pub recent_unlocked: Vec<AchievementProgress>,
    pub leaderboard_score: i64,
    pub leaderboard_rank: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardParams {
    /// Maximum number of entries (1..=100, default 20).
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub score: i64,
    pub rank: u64,
    pub star_tokens: u32,
    pub display_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub total_players: u64,
    pub generated_at: String,
}
