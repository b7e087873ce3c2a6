use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::workshop::{ItemStatus, Visibility, WorkshopComment, WorkshopItem},
    dto::format_millis,
};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
    pub game_id: Option<Uuid>,
    #[validate(length(max = 50))]
    pub version: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[validate(url, length(max = 500))]
    pub file_url: Option<String>,
    #[validate(url, length(max = 500))]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 50))]
    pub version: Option<String>,
    pub visibility: Option<Visibility>,
    #[validate(url, length(max = 500))]
    pub file_url: Option<String>,
    #[validate(url, length(max = 500))]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
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
    pub file_checksum: Option<String>,
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
    /// Present on single-item reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WorkshopItem> for ItemResponse {
    fn from(item: WorkshopItem) -> Self {
        Self {
            id: item.id,
            user_id: item.user_id,
            game_id: item.game_id,
            title: item.title,
            slug: item.slug,
            description: item.description,
            tags: item.tags,
            version: item.version,
            visibility: item.visibility,
            status: item.status,
            file_url: item.file_url,
            file_checksum: item.file_checksum,
            file_size: item.file_size,
            thumbnail_url: item.thumbnail_url,
            auto_flagged: item.auto_flagged,
            auto_score: item.auto_score,
            auto_reasons: item.auto_reasons,
            manual_reviewer_id: item.manual_reviewer_id,
            moderation_notes: item.moderation_notes,
            downloads: item.downloads,
            votes_up: item.votes_up,
            votes_down: item.votes_down,
            rating_avg: None,
            rating_count: None,
            comment_count: None,
            created_at: format_millis(item.created_at),
            updated_at: format_millis(item.updated_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemListParams {
    pub status: Option<ItemStatus>,
    pub visibility: Option<Visibility>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    pub game_id: Option<Uuid>,
    /// Page size (1..=50, default 20).
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Multipart form accepted by the upload endpoint.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadItemForm {
    /// JSON encoded [`CreateItemRequest`].
    pub metadata: String,
    #[schema(content_media_type = "application/octet-stream")]
    pub file: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemPage {
    pub items: Vec<ItemResponse>,
    pub total: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    #[serde(default = "default_true")]
    pub is_upvote: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadResponse {
    /// Empty when the item has no file attached.
    pub download_url: String,
    pub downloads: u64,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ModerationRequest {
    pub action: ItemStatus,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
    pub moderator_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: String,
}

impl From<WorkshopComment> for CommentResponse {
    fn from(comment: WorkshopComment) -> Self {
        Self {
            id: comment.id,
            item_id: comment.item_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: format_millis(comment.created_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CommentListParams {
    /// Page size (1..=100, default 50).
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub score: u8,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct RatingSummary {
    pub item_id: Uuid,
    pub rating_avg: Option<f64>,
    pub rating_count: u64,
}
