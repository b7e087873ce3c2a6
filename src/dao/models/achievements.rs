use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
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
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for Achievement {
    const COLLECTION: &'static str = "achievements";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["code"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Progress of one user towards one achievement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub progress_current: u32,
    pub progress_target: u32,
    pub is_completed: bool,
    pub unlocked_at: Option<Millis>,
    pub last_progress_at: Option<Millis>,
    pub reward_points: u32,
    pub created_at: Millis,
}

impl UserAchievement {
    pub fn progress_percent(&self) -> f64 {
        if self.progress_target == 0 {
            return 0.0;
        }
        let ratio = f64::from(self.progress_current) / f64::from(self.progress_target) * 100.0;
        (ratio.min(100.0) * 100.0).round() / 100.0
    }
}

impl Entity for UserAchievement {
    const COLLECTION: &'static str = "user_achievements";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id", "achievement_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserScore {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_points: i64,
    pub achievements_unlocked: u32,
    pub star_tokens: u32,
    pub last_star_token_at: Option<Millis>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl UserScore {
    pub fn empty(user_id: Uuid, now: Millis) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            total_points: 0,
            achievements_unlocked: 0,
            star_tokens: 0,
            last_star_token_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for UserScore {
    const COLLECTION: &'static str = "user_scores";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
