use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            achievements::{Achievement, UserAchievement, UserScore},
            now_millis,
        },
    },
    dto::{
        SkipLimit,
        achievements::{
            AchievementProgress, AchievementResponse, CreateAchievementRequest,
            LeaderboardEntry, LeaderboardParams, LeaderboardResponse, ProgressRequest,
            ProgressResponse, UpdateAchievementRequest, UserOverview, UserScoreResponse,
        },
        format_millis,
    },
    error::ServiceError,
    services::peers::OutboundNotification,
    state::SharedState,
};

const TOPIC: &str = "achievements";
const RECENT_UNLOCKS: usize = 5;

async fn load_by_code(state: &SharedState, code: &str) -> Result<Achievement, ServiceError> {
    state
        .repo::<Achievement>()
        .await?
        .find_one(Filter::eq("code", code))
        .await?
        .ok_or_else(|| ServiceError::not_found("achievement"))
}

async fn score_row(state: &SharedState, user_id: Uuid) -> Result<UserScore, ServiceError> {
    let scores = state.repo::<UserScore>().await?;
    if let Some(score) = scores.find_one(Filter::id("user_id", user_id)).await? {
        return Ok(score);
    }
    let score = UserScore::empty(user_id, now_millis());
    scores.insert(&score).await?;
    Ok(score)
}

/// Star tokens earned when the score moves from `before` to `after`.
pub fn star_tokens_between(before: i64, after: i64, step: i64) -> u32 {
    let step = step.max(1);
    let earned = after.div_euclid(step) - before.div_euclid(step);
    u32::try_from(earned.max(0)).unwrap_or(u32::MAX)
}

/// One-based leaderboard rank, or `None` for unranked or trimmed players.
async fn leaderboard_rank(
    state: &SharedState,
    score: &UserScore,
) -> Result<Option<u64>, ServiceError> {
    if score.total_points <= 0 {
        return Ok(None);
    }
    let ahead = state
        .repo::<UserScore>()
        .await?
        .count(Filter::gt("total_points", score.total_points))
        .await?;
    let rank = ahead + 1;
    let ceiling = state.config().achievements.leaderboard_max_entries as u64;
    Ok((rank <= ceiling).then_some(rank))
}

pub async fn create_achievement(
    state: &SharedState,
    request: CreateAchievementRequest,
) -> Result<AchievementResponse, ServiceError> {
    let achievements = state.repo::<Achievement>().await?;
    if achievements.count(Filter::eq("code", request.code.as_str())).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "achievement '{}' already exists",
            request.code
        )));
    }
    let now = now_millis();
    let achievement = Achievement {
        id: Uuid::new_v4(),
        code: request.code,
        title: request.title,
        description: request.description,
        points: request.points,
        category: request.category,
        rarity: request.rarity,
        icon_url: request.icon_url,
        is_secret: request.is_secret,
        progress_target: request.progress_target.max(1),
        auto_claim: request.auto_claim,
        created_at: now,
        updated_at: now,
    };
    achievements.insert(&achievement).await?;

    state.events().publish(
        TOPIC,
        "achievement.created",
        json!({ "achievement_id": achievement.id, "code": achievement.code }),
    );
    Ok(achievement.into())
}

pub async fn list_achievements(
    state: &SharedState,
    paging: SkipLimit,
) -> Result<Vec<AchievementResponse>, ServiceError> {
    let (skip, limit) = paging.resolve(50, 100);
    let achievements = state
        .repo::<Achievement>()
        .await?
        .find(
            Query::new(Filter::All)
                .sort_desc("created_at")
                .skip(skip)
                .limit(limit),
        )
        .await?;
    Ok(achievements.into_iter().map(Into::into).collect())
}

pub async fn get_achievement(
    state: &SharedState,
    code: &str,
) -> Result<AchievementResponse, ServiceError> {
    Ok(load_by_code(state, code).await?.into())
}

pub async fn update_achievement(
    state: &SharedState,
    code: &str,
    update: UpdateAchievementRequest,
) -> Result<AchievementResponse, ServiceError> {
    let mut achievement = load_by_code(state, code).await?;
    if let Some(title) = update.title {
        achievement.title = title;
    }
    if let Some(description) = update.description {
        achievement.description = Some(description);
    }
    if let Some(points) = update.points {
        achievement.points = points;
    }
    if let Some(category) = update.category {
        achievement.category = Some(category);
    }
    if let Some(rarity) = update.rarity {
        achievement.rarity = Some(rarity);
    }
    if let Some(icon_url) = update.icon_url {
        achievement.icon_url = Some(icon_url);
    }
    if let Some(is_secret) = update.is_secret {
        achievement.is_secret = is_secret;
    }
    if let Some(target) = update.progress_target {
        achievement.progress_target = target.max(1);
    }
    if let Some(auto_claim) = update.auto_claim {
        achievement.auto_claim = auto_claim;
    }
    achievement.updated_at = now_millis();
    state.repo::<Achievement>().await?.replace(&achievement).await?;
    Ok(achievement.into())
}

/// Apply a progress trigger for `user_id`. Points for an achievement are
/// granted on its first completion only; `score_bonus` is always added.
pub async fn record_progress(
    state: &SharedState,
    user_id: Uuid,
    request: ProgressRequest,
) -> Result<ProgressResponse, ServiceError> {
    let achievement = load_by_code(state, &request.achievement_code).await?;
    let progress_rows = state.repo::<UserAchievement>().await?;
    let now = now_millis();

    let existing = progress_rows
        .find_one(
            Filter::id("user_id", user_id).and(Filter::id("achievement_id", achievement.id)),
        )
        .await?;
    let is_new = existing.is_none();
    let mut progress = existing.unwrap_or_else(|| UserAchievement {
        id: Uuid::new_v4(),
        user_id,
        achievement_id: achievement.id,
        progress_current: 0,
        progress_target: achievement.progress_target.max(1),
        is_completed: false,
        unlocked_at: None,
        last_progress_at: None,
        reward_points: achievement.points,
        created_at: now,
    });
    if progress.progress_target == 0 {
        progress.progress_target = achievement.progress_target.max(1);
    }

    let was_completed = progress.is_completed;
    progress.progress_current = if request.force_complete {
        progress.progress_target
    } else {
        progress
            .progress_current
            .saturating_add(request.progress_delta)
            .min(progress.progress_target)
    };
    if progress.progress_current >= progress.progress_target {
        progress.is_completed = true;
        progress.unlocked_at.get_or_insert(now);
    }
    progress.last_progress_at = Some(now);
    if is_new {
        progress_rows.insert(&progress).await?;
    } else {
        progress_rows.replace(&progress).await?;
    }

    let mut score = score_row(state, user_id).await?;
    let points_before = score.total_points;
    let first_completion = progress.is_completed && !was_completed;
    let mut score_delta = 0i64;
    if first_completion {
        score_delta += i64::from(achievement.points);
        score.achievements_unlocked += 1;
    }
    score_delta += i64::from(request.score_bonus);
    score.total_points += score_delta;

    let mut star_tokens_awarded = 0;
    if score_delta != 0 {
        star_tokens_awarded = star_tokens_between(
            points_before,
            score.total_points,
            state.config().achievements.star_token_score_step,
        );
        if star_tokens_awarded > 0 {
            score.star_tokens += star_tokens_awarded;
            score.last_star_token_at = Some(now);
        }
    }
    score.updated_at = now;
    state.repo::<UserScore>().await?.replace(&score).await?;

    if first_completion {
        info!(%user_id, code = %achievement.code, "achievement unlocked");
        state.events().publish(
            TOPIC,
            "achievement.unlocked",
            json!({
                "user_id": user_id,
                "code": achievement.code,
                "score_delta": score_delta,
                "star_tokens": star_tokens_awarded,
            }),
        );
        if request.notify {
            state.peers().notify(OutboundNotification {
                user_id,
                title: "Achievement Unlocked".into(),
                message: format!(
                    "You unlocked {} (+{} XP)!",
                    achievement.title, achievement.points
                ),
                category: "achievement".into(),
                priority: "normal".into(),
                metadata: json!({
                    "achievement_code": achievement.code,
                    "score_delta": score_delta.to_string(),
                    "star_tokens": star_tokens_awarded.to_string(),
                }),
            });
        }
    }

    let rank = leaderboard_rank(state, &score).await?;
    Ok(ProgressResponse {
        user: UserScoreResponse::new(&score, rank),
        achievement: AchievementProgress::new(&progress, &achievement),
        star_tokens_awarded,
        score_delta,
        leaderboard_score: score.total_points,
    })
}

/// Score, progress and recent unlocks of a user; creates the score row on
/// first access.
pub async fn user_overview(
    state: &SharedState,
    user_id: Uuid,
) -> Result<UserOverview, ServiceError> {
    let score = score_row(state, user_id).await?;
    let rows = state
        .repo::<UserAchievement>()
        .await?
        .find(
            Query::new(Filter::id("user_id", user_id))
                .sort_desc("last_progress_at")
                .sort_desc("created_at"),
        )
        .await?;
    let definitions = state
        .repo::<Achievement>()
        .await?
        .find_all(Filter::any_of(
            "id",
            rows.iter().map(|row| row.achievement_id.to_string()),
        ))
        .await?;

    let mut paired: Vec<(&UserAchievement, &Achievement)> = rows
        .iter()
        .filter_map(|row| {
            definitions
                .iter()
                .find(|definition| definition.id == row.achievement_id)
                .map(|definition| (row, definition))
        })
        .collect();
    let achievements = paired
        .iter()
        .map(|(row, definition)| AchievementProgress::new(row, definition))
        .collect();

    paired.retain(|(row, _)| row.unlocked_at.is_some());
    paired.sort_by(|a, b| b.0.unlocked_at.cmp(&a.0.unlocked_at));
    let recent_unlocked = paired
        .iter()
        .take(RECENT_UNLOCKS)
        .map(|(row, definition)| AchievementProgress::new(row, definition))
        .collect();

    let rank = leaderboard_rank(state, &score).await?;
    Ok(UserOverview {
        user: UserScoreResponse::new(&score, rank),
        achievements,
        recent_unlocked,
        leaderboard_score: score.total_points,
        leaderboard_rank: rank,
    })
}

/// Players ranked by total points, enriched with profile names when the
/// user service answers.
pub async fn leaderboard(
    state: &SharedState,
    params: LeaderboardParams,
) -> Result<LeaderboardResponse, ServiceError> {
    let ceiling = state.config().achievements.leaderboard_max_entries as u64;
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = params.offset.unwrap_or(0);
    let scores = state.repo::<UserScore>().await?;
    let ranked = Filter::gt("total_points", 0);
    let total_players = scores.count(ranked.clone()).await?.min(ceiling);

    let window = limit.min(ceiling.saturating_sub(offset));
    let rows = if window == 0 {
        Vec::new()
    } else {
        scores
            .find(
                Query::new(ranked)
                    .sort_desc("total_points")
                    .sort_asc("updated_at")
                    .skip(offset)
                    .limit(window),
            )
            .await?
    };

    let user_ids: Vec<Uuid> = rows.iter().map(|row| row.user_id).collect();
    let profiles = state.peers().fetch_profiles(&user_ids).await;
    let entries = rows
        .into_iter()
        .zip(offset + 1..)
        .map(|(row, rank)| {
            let profile = profiles.get(&row.user_id);
            LeaderboardEntry {
                user_id: row.user_id,
                score: row.total_points,
                rank,
                star_tokens: row.star_tokens,
                display_name: profile.and_then(|p| p.display_name.clone()),
                username: profile.and_then(|p| p.username.clone()),
            }
        })
        .collect();

    Ok(LeaderboardResponse {
        entries,
        total_players,
        generated_at: format_millis(now_millis()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn definition(code: &str, points: u32, target: u32) -> CreateAchievementRequest {
        CreateAchievementRequest {
            code: code.into(),
            title: format!("Title {code}"),
            description: None,
            points,
            category: None,
            rarity: None,
            icon_url: None,
            is_secret: false,
            progress_target: target,
            auto_claim: true,
        }
    }

    fn trigger(code: &str, delta: u32) -> ProgressRequest {
        ProgressRequest {
            achievement_code: code.into(),
            progress_delta: delta,
            score_bonus: 0,
            force_complete: false,
            metadata: None,
            notify: false,
        }
    }

    #[test]
    fn star_tokens_follow_score_steps() {
        assert_eq!(star_tokens_between(0, 499, 500), 0);
        assert_eq!(star_tokens_between(499, 500, 500), 1);
        assert_eq!(star_tokens_between(450, 1600, 500), 3);
        assert_eq!(star_tokens_between(1000, 900, 500), 0);
    }

    #[tokio::test]
    async fn duplicate_codes_conflict() {
        let state = memory_state().await;
        create_achievement(&state, definition("first-blood", 100, 1))
            .await
            .unwrap();
        assert!(matches!(
            create_achievement(&state, definition("first-blood", 10, 1)).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn completion_awards_points_once() {
        let state = memory_state().await;
        create_achievement(&state, definition("collector", 300, 3))
            .await
            .unwrap();
        let user = Uuid::new_v4();

        let partial = record_progress(&state, user, trigger("collector", 2)).await.unwrap();
        assert!(!partial.achievement.is_completed);
        assert_eq!(partial.score_delta, 0);
        assert_eq!(partial.achievement.progress_percent, 66.67);

        let done = record_progress(&state, user, trigger("collector", 5)).await.unwrap();
        assert!(done.achievement.is_completed);
        assert_eq!(done.achievement.progress_current, 3);
        assert_eq!(done.score_delta, 300);
        assert_eq!(done.user.leaderboard_rank, Some(1));

        let again = record_progress(
            &state,
            user,
            ProgressRequest {
                score_bonus: 250,
                ..trigger("collector", 1)
            },
        )
        .await
        .unwrap();
        assert_eq!(again.score_delta, 250);
        assert_eq!(again.star_tokens_awarded, 1);
        assert_eq!(again.user.total_points, 550);
        assert_eq!(again.user.achievements_unlocked, 1);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let state = memory_state().await;
        assert!(matches!(
            record_progress(&state, Uuid::new_v4(), trigger("nope", 1)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn overview_creates_empty_score() {
        let state = memory_state().await;
        let user = Uuid::new_v4();
        let overview = user_overview(&state, user).await.unwrap();
        assert_eq!(overview.user.total_points, 0);
        assert_eq!(overview.leaderboard_rank, None);
        assert!(overview.achievements.is_empty());
        assert_eq!(
            state
                .repo::<UserScore>()
                .await
                .unwrap()
                .count(Filter::id("user_id", user))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn leaderboard_orders_by_points() {
        let state = memory_state().await;
        create_achievement(&state, definition("small", 10, 1)).await.unwrap();
        create_achievement(&state, definition("big", 900, 1)).await.unwrap();
        let (low, high) = (Uuid::new_v4(), Uuid::new_v4());
        record_progress(&state, low, trigger("small", 1)).await.unwrap();
        record_progress(&state, high, trigger("big", 1)).await.unwrap();
        user_overview(&state, Uuid::new_v4()).await.unwrap();

        let board = leaderboard(&state, LeaderboardParams::default()).await.unwrap();
        assert_eq!(board.total_players, 2);
        assert_eq!(board.entries[0].user_id, high);
        assert_eq!(board.entries[0].rank, 1);
        assert_eq!(board.entries[1].user_id, low);
        assert_eq!(board.entries[1].rank, 2);
    }

    #[tokio::test]
    async fn overview_lists_most_recent_progress_first() {
        let state = memory_state().await;
        let user = Uuid::new_v4();
        // alpha touched last, beta first
        let mut touched = Vec::new();
        for (code, at) in [("alpha", 3_000), ("beta", 1_000), ("gamma", 2_000)] {
            let created = create_achievement(&state, definition(code, 10, 5)).await.unwrap();
            record_progress(&state, user, trigger(code, 1)).await.unwrap();
            touched.push((created.id, at));
        }

        let progress = state.repo::<UserAchievement>().await.unwrap();
        for mut row in progress.find_all(Filter::id("user_id", user)).await.unwrap() {
            let at = touched
                .iter()
                .find(|(id, _)| *id == row.achievement_id)
                .map(|(_, at)| *at);
            row.last_progress_at = at;
            progress.replace(&row).await.unwrap();
        }

        let overview = user_overview(&state, user).await.unwrap();
        let codes: Vec<&str> = overview
            .achievements
            .iter()
            .map(|item| item.achievement_code.as_str())
            .collect();
        assert_eq!(codes, ["alpha", "gamma", "beta"]);
    }
}
