use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            now_millis,
            reviews::{Review, ReviewComment, ReviewStatus, ReviewVote},
        },
    },
    dto::reviews::{
        CommentResponse, CreateCommentRequest, CreateReviewRequest, ReviewResponse,
        UpdateReviewRequest, VoteRequest, VoteResponse,
    },
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "reviews";

fn positive_for(rating: u8) -> bool {
    rating >= 4
}

async fn load_review(state: &SharedState, id: Uuid) -> Result<Review, ServiceError> {
    state
        .repo::<Review>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("review"))
}

/// Publish a review; one review per user and game.
pub async fn create_review(
    state: &SharedState,
    request: CreateReviewRequest,
) -> Result<ReviewResponse, ServiceError> {
    let reviews = state.repo::<Review>().await?;
    let existing = reviews
        .count(Filter::id("user_id", request.user_id).and(Filter::id("game_id", request.game_id)))
        .await?;
    if existing > 0 {
        return Err(ServiceError::Conflict(
            "user already reviewed this game".into(),
        ));
    }

    let now = now_millis();
    let review = Review {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        game_id: request.game_id,
        title: request.title,
        content: request.content,
        rating: request.rating,
        is_positive: request
            .is_positive
            .unwrap_or_else(|| positive_for(request.rating)),
        status: ReviewStatus::Approved,
        playtime_hours: request.playtime_hours,
        helpful_votes: 0,
        unhelpful_votes: 0,
        total_votes: 0,
        created_at: now,
        updated_at: now,
    };
    reviews.insert(&review).await?;

    info!(review_id = %review.id, game_id = %review.game_id, "review created");
    state.events().publish(
        TOPIC,
        "review.created",
        json!({
            "review_id": review.id,
            "user_id": review.user_id,
            "game_id": review.game_id,
            "rating": review.rating,
        }),
    );
    Ok(review.into())
}

pub async fn get_review(state: &SharedState, id: Uuid) -> Result<ReviewResponse, ServiceError> {
    Ok(load_review(state, id).await?.into())
}

/// Approved reviews of a game, newest first.
pub async fn game_reviews(
    state: &SharedState,
    game_id: Uuid,
    skip: u64,
    limit: u64,
) -> Result<Vec<ReviewResponse>, ServiceError> {
    let filter = Filter::id("game_id", game_id).and(Filter::eq("status", "approved"));
    let reviews = state
        .repo::<Review>()
        .await?
        .find(Query::new(filter).sort_desc("created_at").skip(skip).limit(limit))
        .await?;
    Ok(reviews.into_iter().map(Into::into).collect())
}

pub async fn user_reviews(
    state: &SharedState,
    user_id: Uuid,
    skip: u64,
    limit: u64,
) -> Result<Vec<ReviewResponse>, ServiceError> {
    let reviews = state
        .repo::<Review>()
        .await?
        .find(
            Query::new(Filter::id("user_id", user_id))
                .sort_desc("created_at")
                .skip(skip)
                .limit(limit),
        )
        .await?;
    Ok(reviews.into_iter().map(Into::into).collect())
}

pub async fn update_review(
    state: &SharedState,
    id: Uuid,
    request: UpdateReviewRequest,
) -> Result<ReviewResponse, ServiceError> {
    let mut review = load_review(state, id).await?;
    if let Some(title) = request.title {
        review.title = Some(title);
    }
    if let Some(content) = request.content {
        review.content = content;
    }
    if let Some(rating) = request.rating {
        review.rating = rating;
        review.is_positive = positive_for(rating);
    }
    if let Some(is_positive) = request.is_positive {
        review.is_positive = is_positive;
    }
    if let Some(hours) = request.playtime_hours {
        review.playtime_hours = Some(hours);
    }
    if let Some(status) = request.status {
        review.status = status;
    }
    review.updated_at = now_millis();
    state.repo::<Review>().await?.replace(&review).await?;

    state.events().publish(
        TOPIC,
        "review.updated",
        json!({ "review_id": review.id, "rating": review.rating }),
    );
    Ok(review.into())
}

/// Delete a review together with its comments and votes.
pub async fn delete_review(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let review = load_review(state, id).await?;
    let comments = state
        .repo::<ReviewComment>()
        .await?
        .delete_many(Filter::id("review_id", id))
        .await?;
    let votes = state
        .repo::<ReviewVote>()
        .await?
        .delete_many(Filter::id("review_id", id))
        .await?;
    state.repo::<Review>().await?.delete(id).await?;

    info!(review_id = %id, comments, votes, "review deleted");
    state.events().publish(
        TOPIC,
        "review.deleted",
        json!({ "review_id": id, "game_id": review.game_id }),
    );
    Ok(())
}

pub async fn add_comment(
    state: &SharedState,
    request: CreateCommentRequest,
) -> Result<CommentResponse, ServiceError> {
    load_review(state, request.review_id).await?;
    let comments = state.repo::<ReviewComment>().await?;
    if let Some(parent_id) = request.parent_comment_id {
        let parent = comments
            .get(parent_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("parent comment"))?;
        if parent.review_id != request.review_id {
            return Err(ServiceError::InvalidInput(
                "parent comment belongs to another review".into(),
            ));
        }
    }

    let comment = ReviewComment {
        id: Uuid::new_v4(),
        review_id: request.review_id,
        user_id: request.user_id,
        content: request.content,
        parent_comment_id: request.parent_comment_id,
        created_at: now_millis(),
    };
    comments.insert(&comment).await?;
    state.events().publish(
        TOPIC,
        "review.commented",
        json!({ "review_id": comment.review_id, "comment_id": comment.id }),
    );
    Ok(comment.into())
}

/// Comments of a review, oldest first.
pub async fn list_comments(
    state: &SharedState,
    review_id: Uuid,
) -> Result<Vec<CommentResponse>, ServiceError> {
    load_review(state, review_id).await?;
    let comments = state
        .repo::<ReviewComment>()
        .await?
        .find(Query::new(Filter::id("review_id", review_id)).sort_asc("created_at"))
        .await?;
    Ok(comments.into_iter().map(Into::into).collect())
}

/// Record or change the caller's vote, then recount every vote of the review.
pub async fn vote(
    state: &SharedState,
    review_id: Uuid,
    request: VoteRequest,
) -> Result<VoteResponse, ServiceError> {
    let mut review = load_review(state, review_id).await?;
    let votes = state.repo::<ReviewVote>().await?;
    let now = now_millis();

    let vote = match votes
        .find_one(Filter::id("review_id", review_id).and(Filter::id("user_id", request.user_id)))
        .await?
    {
        Some(mut vote) => {
            vote.is_helpful = request.is_helpful;
            vote.updated_at = now;
            votes.replace(&vote).await?;
            vote
        }
        None => {
            let vote = ReviewVote {
                id: Uuid::new_v4(),
                review_id,
                user_id: request.user_id,
                is_helpful: request.is_helpful,
                created_at: now,
                updated_at: now,
            };
            votes.insert(&vote).await?;
            vote
        }
    };

    let all = votes.find_all(Filter::id("review_id", review_id)).await?;
    review.helpful_votes = all.iter().filter(|vote| vote.is_helpful).count() as u64;
    review.unhelpful_votes = all.len() as u64 - review.helpful_votes;
    review.total_votes = all.len() as u64;
    review.updated_at = now;
    state.repo::<Review>().await?.replace(&review).await?;

    state.events().publish(
        TOPIC,
        "review.voted",
        json!({
            "review_id": review_id,
            "user_id": request.user_id,
            "is_helpful": request.is_helpful,
        }),
    );
    Ok(vote.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn review(user_id: Uuid, game_id: Uuid, rating: u8) -> CreateReviewRequest {
        CreateReviewRequest {
            user_id,
            game_id,
            title: None,
            content: "Solid game".into(),
            rating,
            is_positive: None,
            playtime_hours: Some(12.5),
        }
    }

    #[tokio::test]
    async fn one_review_per_user_and_game() {
        let state = memory_state().await;
        let (user, game) = (Uuid::new_v4(), Uuid::new_v4());
        let created = create_review(&state, review(user, game, 5)).await.unwrap();
        assert!(created.is_positive);

        let err = create_review(&state, review(user, game, 2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn rating_change_rederives_positivity() {
        let state = memory_state().await;
        let created = create_review(&state, review(Uuid::new_v4(), Uuid::new_v4(), 5))
            .await
            .unwrap();
        let updated = update_review(
            &state,
            created.id,
            UpdateReviewRequest {
                rating: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!updated.is_positive);
    }

    #[tokio::test]
    async fn vote_aggregates_match_stored_votes() {
        let state = memory_state().await;
        let created = create_review(&state, review(Uuid::new_v4(), Uuid::new_v4(), 4))
            .await
            .unwrap();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let first = vote(&state, created.id, VoteRequest { user_id: alice, is_helpful: true })
            .await
            .unwrap();
        vote(&state, created.id, VoteRequest { user_id: bob, is_helpful: true })
            .await
            .unwrap();
        let switched = vote(&state, created.id, VoteRequest { user_id: alice, is_helpful: false })
            .await
            .unwrap();
        assert_eq!(switched.id, first.id);
        assert!(!switched.is_helpful);

        let after = get_review(&state, created.id).await.unwrap();
        assert_eq!(after.total_votes, 2);
        assert_eq!(after.helpful_votes, 1);
        assert_eq!(after.unhelpful_votes, 1);
    }

    #[tokio::test]
    async fn deleting_a_review_removes_comments() {
        let state = memory_state().await;
        let created = create_review(&state, review(Uuid::new_v4(), Uuid::new_v4(), 3))
            .await
            .unwrap();
        add_comment(
            &state,
            CreateCommentRequest {
                review_id: created.id,
                user_id: Uuid::new_v4(),
                content: "Agreed".into(),
                parent_comment_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(list_comments(&state, created.id).await.unwrap().len(), 1);

        delete_review(&state, created.id).await.unwrap();
        assert!(matches!(
            list_comments(&state, created.id).await,
            Err(ServiceError::NotFound(_))
        ));
        let orphans = state
            .repo::<ReviewComment>()
            .await
            .unwrap()
            .count(Filter::All)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
