use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Active,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumPost {
    pub id: Uuid,
    pub user_id: Uuid,
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
    pub last_reply_at: Option<Millis>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for ForumPost {
    const COLLECTION: &'static str = "forum_posts";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["slug"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumReply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub parent_reply_id: Option<Uuid>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for ForumReply {
    const COLLECTION: &'static str = "forum_replies";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumPostLike {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: Millis,
}

impl Entity for ForumPostLike {
    const COLLECTION: &'static str = "forum_post_likes";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["post_id", "user_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
