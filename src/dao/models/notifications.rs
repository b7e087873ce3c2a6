use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: String,
    pub priority: NotificationPriority,
    pub delivered_via: Vec<String>,
    pub metadata: Value,
    pub is_read: bool,
    pub read_at: Option<Millis>,
    pub created_at: Millis,
}

impl Entity for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}
