use std::{collections::HashSet, sync::Arc};

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            Millis, now_millis,
            recommendations::{Recommendation, RecommendationFeedback, UserGameInteraction},
        },
    },
    dto::{
        format_millis, parse_timestamp,
        recommendations::{
            FeedbackRequest, FeedbackResponse, GenerationRequest, InteractionBatch,
            InteractionIngestResponse, RecommendationBatchRequest, RecommendationItem,
            RecommendationResponse, TrainingRequest, TrainingResponse,
        },
    },
    error::ServiceError,
    services::recommender::{ScoreSource, Signal, TrainedModel},
    state::SharedState,
};

const TOPIC: &str = "recommendations";
const HOUR_MILLIS: Millis = 3_600_000;
const GENERATED_TTL_HOURS: i64 = 24;

/// Default weight of an interaction event type.
fn event_weight(event_type: &str) -> f64 {
    match event_type {
        "view" => 1.0,
        "play" => 2.0,
        "wishlist" => 3.0,
        "review" => 4.0,
        "purchase" => 5.0,
        _ => 1.0,
    }
}

/// Deactivate the current batch of a user and store a new ranked one.
pub async fn replace_batch(
    state: &SharedState,
    request: RecommendationBatchRequest,
) -> Result<Vec<RecommendationResponse>, ServiceError> {
    if request.recommendations.is_empty() {
        return Err(ServiceError::InvalidInput(
            "recommendations list cannot be empty".into(),
        ));
    }
    let recommendations = state.repo::<Recommendation>().await?;
    let active = recommendations
        .find(Query::new(
            Filter::id("user_id", request.user_id).and(Filter::eq("is_active", true)),
        ))
        .await?;
    for mut previous in active {
        previous.is_active = false;
        recommendations.replace(&previous).await?;
    }

    let now = now_millis();
    let expires_at = request
        .expires_in_hours
        .map(|hours| now + hours * HOUR_MILLIS);
    let mut stored = Vec::with_capacity(request.recommendations.len());
    for (rank, item) in request.recommendations.into_iter().enumerate() {
        let recommendation = Recommendation {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            game_id: item.game_id,
            score: item.score.max(0.0),
            rank: rank as u32 + 1,
            algorithm: item.algorithm,
            reason: item.reason,
            context: item.context.unwrap_or_else(|| json!({})),
            is_active: true,
            expires_at,
            created_at: now,
        };
        recommendations.insert(&recommendation).await?;
        stored.push(recommendation);
    }

    state.events().publish(
        TOPIC,
        "recommendations.created",
        json!({ "user_id": request.user_id, "count": stored.len() }),
    );
    Ok(stored.into_iter().map(Into::into).collect())
}

/// Active, unexpired recommendations ordered by rank.
pub async fn user_recommendations(
    state: &SharedState,
    user_id: Uuid,
    limit: usize,
) -> Result<Vec<RecommendationResponse>, ServiceError> {
    let now = now_millis();
    let active = state
        .repo::<Recommendation>()
        .await?
        .find(
            Query::new(Filter::id("user_id", user_id).and(Filter::eq("is_active", true)))
                .sort_asc("rank"),
        )
        .await?;
    Ok(active
        .into_iter()
        .filter(|recommendation| recommendation.expires_at.is_none_or(|at| at > now))
        .take(limit)
        .map(Into::into)
        .collect())
}

pub async fn record_feedback(
    state: &SharedState,
    request: FeedbackRequest,
) -> Result<FeedbackResponse, ServiceError> {
    let recommendation_id = match request.recommendation_id {
        Some(id) => Some(id),
        None => state
            .repo::<Recommendation>()
            .await?
            .find(
                Query::new(
                    Filter::id("user_id", request.user_id)
                        .and(Filter::id("game_id", request.game_id))
                        .and(Filter::eq("is_active", true)),
                )
                .sort_asc("rank")
                .limit(1),
            )
            .await?
            .into_iter()
            .next()
            .map(|recommendation| recommendation.id),
    };

    let feedback = RecommendationFeedback {
        id: Uuid::new_v4(),
        recommendation_id,
        user_id: request.user_id,
        game_id: request.game_id,
        action: request.action,
        details: request.details.unwrap_or_else(|| json!({})),
        created_at: now_millis(),
    };
    state
        .repo::<RecommendationFeedback>()
        .await?
        .insert(&feedback)
        .await?;

    state.events().publish(
        TOPIC,
        "recommendation.feedback",
        json!({
            "user_id": feedback.user_id,
            "game_id": feedback.game_id,
            "action": feedback.action,
            "recommendation_id": recommendation_id,
        }),
    );
    Ok(feedback.into())
}

/// Fold interaction events into the per user and game accumulators.
pub async fn ingest_interactions(
    state: &SharedState,
    batch: InteractionBatch,
) -> Result<InteractionIngestResponse, ServiceError> {
    if batch.interactions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "interactions list cannot be empty".into(),
        ));
    }
    let interactions = state.repo::<UserGameInteraction>().await?;
    let now = now_millis();
    let mut outcome = InteractionIngestResponse {
        created: 0,
        updated: 0,
    };

    for event in batch.interactions {
        let weight = event
            .weight
            .unwrap_or_else(|| event_weight(&event.event_type));
        let occurred_at = event
            .occurred_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now);
        let existing = interactions
            .find_one(
                Filter::id("user_id", event.user_id).and(Filter::id("game_id", event.game_id)),
            )
            .await?;
        match existing {
            Some(mut row) => {
                row.score += weight;
                row.interactions += 1;
                row.last_event_type = event.event_type;
                row.last_event_at = occurred_at;
                interactions.replace(&row).await?;
                outcome.updated += 1;
            }
            None => {
                interactions
                    .insert(&UserGameInteraction {
                        id: Uuid::new_v4(),
                        user_id: event.user_id,
                        game_id: event.game_id,
                        score: weight,
                        interactions: 1,
                        last_event_type: event.event_type,
                        last_event_at: occurred_at,
                        created_at: now,
                    })
                    .await?;
                outcome.created += 1;
            }
        }
    }
    Ok(outcome)
}

/// Train the collaborative model on every stored interaction and install it.
pub async fn train(
    state: &SharedState,
    request: TrainingRequest,
) -> Result<TrainingResponse, ServiceError> {
    let settings = &state.config().recommender;
    let signals: Vec<Signal> = state
        .repo::<UserGameInteraction>()
        .await?
        .find_all(Filter::gt("score", 0.0))
        .await?
        .into_iter()
        .map(|row| Signal {
            user_id: row.user_id,
            game_id: row.game_id,
            score: row.score,
        })
        .collect();

    let model = TrainedModel::train(
        &signals,
        request.n_components.unwrap_or(settings.n_components),
        request.min_interactions.unwrap_or(settings.min_interactions),
    )
    .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    if request.persist
        && let Some(path) = &settings.model_path
        && let Err(err) = model.save(path).await
    {
        warn!(path = %path.display(), error = %err, "failed to persist recommendation model");
    }

    let response = TrainingResponse {
        interactions: model.interactions,
        users: model.users.len(),
        games: model.games.len(),
        components: model.n_components,
        trained_at: format_millis(model.trained_at),
    };
    info!(
        interactions = response.interactions,
        users = response.users,
        games = response.games,
        "recommendation model trained"
    );
    state.install_model(Arc::new(model)).await;
    Ok(response)
}

/// Score unseen games for a user and store them as the active batch.
pub async fn generate(
    state: &SharedState,
    user_id: Uuid,
    request: GenerationRequest,
) -> Result<Vec<RecommendationResponse>, ServiceError> {
    let model = state
        .model()
        .await
        .ok_or_else(|| ServiceError::Conflict("model has not been trained yet".into()))?;

    let seen: HashSet<Uuid> = state
        .repo::<UserGameInteraction>()
        .await?
        .find(Query::new(Filter::id("user_id", user_id)))
        .await?
        .into_iter()
        .map(|row| row.game_id)
        .collect();

    let limit = request
        .limit
        .min(state.config().recommender.max_recommendations);
    let scored = model.recommend(user_id, &seen, limit);
    if scored.is_empty() {
        return Err(ServiceError::not_found("recommendation candidates"));
    }

    let recommendations = scored
        .into_iter()
        .map(|game| RecommendationItem {
            game_id: game.game_id,
            score: game.score.max(0.0),
            reason: request.reason.clone(),
            context: Some(json!({ "source": match game.source {
                ScoreSource::Collaborative => "collaborative",
                ScoreSource::Popularity => "popularity",
            } })),
            algorithm: request.algorithm.clone(),
        })
        .collect();

    replace_batch(
        state,
        RecommendationBatchRequest {
            user_id,
            recommendations,
            expires_in_hours: Some(GENERATED_TTL_HOURS),
        },
    )
    .await
}

/// Load the persisted model when one is configured and present.
pub async fn load_persisted_model(state: &SharedState) {
    let Some(path) = state.config().recommender.model_path.clone() else {
        return;
    };
    match TrainedModel::load(&path).await {
        Ok(model) => {
            info!(path = %path.display(), games = model.games.len(), "recommendation model loaded");
            state.install_model(Arc::new(model)).await;
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to load recommendation model");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::recommendations::FeedbackAction, dto::recommendations::InteractionEvent,
        state::test_support::memory_state,
    };

    fn item(game_id: Uuid, score: f64) -> RecommendationItem {
        RecommendationItem {
            game_id,
            score,
            reason: None,
            context: None,
            algorithm: "hybrid".into(),
        }
    }

    fn event(user_id: Uuid, game_id: Uuid, event_type: &str) -> InteractionEvent {
        InteractionEvent {
            user_id,
            game_id,
            event_type: event_type.into(),
            weight: None,
            occurred_at: None,
        }
    }

    #[tokio::test]
    async fn new_batch_replaces_active_one() {
        let state = memory_state().await;
        let user = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        replace_batch(
            &state,
            RecommendationBatchRequest {
                user_id: user,
                recommendations: vec![item(a, 0.9)],
                expires_in_hours: None,
            },
        )
        .await
        .unwrap();
        let second = replace_batch(
            &state,
            RecommendationBatchRequest {
                user_id: user,
                recommendations: vec![item(b, 0.8), item(c, 0.5)],
                expires_in_hours: Some(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(second[1].rank, 2);

        let active = user_recommendations(&state, user, 50).await.unwrap();
        let games: Vec<Uuid> = active.iter().map(|r| r.game_id).collect();
        assert_eq!(games, vec![b, c]);

        let feedback = record_feedback(
            &state,
            FeedbackRequest {
                recommendation_id: None,
                user_id: user,
                game_id: c,
                action: FeedbackAction::Clicked,
                details: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(feedback.recommendation_id, Some(second[1].id));
    }

    #[tokio::test]
    async fn empty_batches_are_rejected() {
        let state = memory_state().await;
        let empty = replace_batch(
            &state,
            RecommendationBatchRequest {
                user_id: Uuid::new_v4(),
                recommendations: Vec::new(),
                expires_in_hours: None,
            },
        )
        .await;
        assert!(matches!(empty, Err(ServiceError::InvalidInput(_))));
        let no_events = ingest_interactions(&state, InteractionBatch { interactions: vec![] }).await;
        assert!(matches!(no_events, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn interactions_accumulate_default_weights() {
        let state = memory_state().await;
        let (user, game) = (Uuid::new_v4(), Uuid::new_v4());
        let outcome = ingest_interactions(
            &state,
            InteractionBatch {
                interactions: vec![event(user, game, "view"), event(user, game, "purchase")],
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, InteractionIngestResponse { created: 1, updated: 1 });

        let row = state
            .repo::<UserGameInteraction>()
            .await
            .unwrap()
            .find_one(Filter::id("user_id", user))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.score, 6.0);
        assert_eq!(row.interactions, 2);
        assert_eq!(row.last_event_type, "purchase");
    }

    #[tokio::test]
    async fn generation_needs_a_model_then_skips_seen_games() {
        let state = memory_state().await;
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let games: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        let untrained = generate(&state, users[0], GenerationRequest::default()).await;
        assert!(matches!(untrained, Err(ServiceError::Conflict(_))));

        let pairs = [(0, 0), (0, 1), (1, 0), (1, 2), (2, 1), (2, 2)];
        ingest_interactions(
            &state,
            InteractionBatch {
                interactions: pairs
                    .iter()
                    .map(|(u, g)| event(users[*u], games[*g], "play"))
                    .collect(),
            },
        )
        .await
        .unwrap();

        let sparse = train(
            &state,
            TrainingRequest {
                min_interactions: Some(10),
                n_components: None,
                persist: false,
            },
        )
        .await;
        assert!(matches!(sparse, Err(ServiceError::InvalidInput(_))));

        let trained = train(&state, TrainingRequest::default()).await.unwrap();
        assert_eq!(trained.users, 3);

        let generated = generate(&state, users[0], GenerationRequest::default())
            .await
            .unwrap();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].game_id, games[2]);
        assert_eq!(generated[0].algorithm, "collaborative");
        assert!(generated[0].expires_at.is_some());
        assert_eq!(generated[0].context, json!({ "source": "collaborative" }));
    }
}
