use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::forum::{ForumPost, ForumReply, PostStatus},
    dto::{format_millis, format_opt_millis},
    services::peers::PeerProfile,
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub tags: Vec<String>,
    pub game_id: Option<Uuid>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_locked: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(length(max = 10))]
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_locked: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_username: Option<String>,
    pub author_avatar_url: Option<String>,
    pub game_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub views: u64,
    pub likes: u64,
    pub replies_count: u64,
    pub last_reply_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResponse {
    pub fn new(post: ForumPost, author: Option<&PeerProfile>) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            author_username: author.and_then(|profile| profile.username.clone()),
            author_avatar_url: author.and_then(|profile| profile.avatar_url.clone()),
            game_id: post.game_id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            tags: post.tags,
            status: post.status,
            is_pinned: post.is_pinned,
            is_locked: post.is_locked,
            views: post.views,
            likes: post.likes,
            replies_count: post.replies_count,
            last_reply_at: format_opt_millis(post.last_reply_at),
            created_at: format_millis(post.created_at),
            updated_at: format_millis(post.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    Newest,
    /// Most viewed.
    Popular,
    Replies,
    Likes,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostListParams {
    pub game_id: Option<Uuid>,
    /// Case-insensitive match on title or content.
    pub search: Option<String>,
    pub sort_by: Option<PostSort>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostPage {
    pub items: Vec<PostResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: u64,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReplyRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    pub parent_reply_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReplyResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub author_username: Option<String>,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub parent_reply_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    #[schema(no_recursion)]
    pub child_replies: Vec<ReplyResponse>,
}

impl ReplyResponse {
    pub fn new(reply: ForumReply, author: Option<&PeerProfile>) -> Self {
        Self {
            id: reply.id,
            post_id: reply.post_id,
            user_id: reply.user_id,
            author_username: author.and_then(|profile| profile.username.clone()),
            author_avatar_url: author.and_then(|profile| profile.avatar_url.clone()),
            content: reply.content,
            parent_reply_id: reply.parent_reply_id,
            created_at: format_millis(reply.created_at),
            updated_at: format_millis(reply.updated_at),
            child_replies: Vec::new(),
        }
    }
}
