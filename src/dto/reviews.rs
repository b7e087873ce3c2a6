use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::reviews::{Review, ReviewComment, ReviewStatus, ReviewVote},
    dto::format_millis,
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReviewRequest {
    pub user_id: Uuid,
    pub game_id: Uuid,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    /// Defaults to `rating >= 4`.
    pub is_positive: Option<bool>,
    #[validate(range(min = 0.0))]
    pub playtime_hours: Option<f64>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub content: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<u8>,
    pub is_positive: Option<bool>,
    #[validate(range(min = 0.0))]
    pub playtime_hours: Option<f64>,
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
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
    pub created_at: String,
    pub updated_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            user_id: review.user_id,
            game_id: review.game_id,
            title: review.title,
            content: review.content,
            rating: review.rating,
            is_positive: review.is_positive,
            status: review.status,
            playtime_hours: review.playtime_hours,
            helpful_votes: review.helpful_votes,
            unhelpful_votes: review.unhelpful_votes,
            total_votes: review.total_votes,
            created_at: format_millis(review.created_at),
            updated_at: format_millis(review.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCommentRequest {
    pub review_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
    pub created_at: String,
}

impl From<ReviewComment> for CommentResponse {
    fn from(comment: ReviewComment) -> Self {
        Self {
            id: comment.id,
            review_id: comment.review_id,
            user_id: comment.user_id,
            content: comment.content,
            parent_comment_id: comment.parent_comment_id,
            created_at: format_millis(comment.created_at),
        }
    }
}

/// Helpfulness vote, sent as query parameters.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VoteRequest {
    pub user_id: Uuid,
    pub is_helpful: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub is_helpful: bool,
    pub created_at: String,
}

impl From<ReviewVote> for VoteResponse {
    fn from(vote: ReviewVote) -> Self {
        Self {
            id: vote.id,
            review_id: vote.review_id,
            user_id: vote.user_id,
            is_helpful: vote.is_helpful,
            created_at: format_millis(vote.created_at),
        }
    }
}
