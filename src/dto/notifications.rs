use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::notifications::{Notification, NotificationPriority},
    dto::{format_millis, format_opt_millis},
};

fn default_category() -> String {
    "system".into()
}

fn default_channels() -> Vec<String> {
    vec!["in_app".into()]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[serde(default = "default_category")]
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default = "default_channels")]
    pub delivered_via: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: String,
    pub priority: NotificationPriority,
    pub delivered_via: Vec<String>,
    pub metadata: Value,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            category: notification.category,
            priority: notification.priority,
            delivered_via: notification.delivered_via,
            metadata: notification.metadata,
            is_read: notification.is_read,
            read_at: format_opt_millis(notification.read_at),
            created_at: format_millis(notification.created_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    /// Only return unread notifications.
    #[serde(default, alias = "unread_only")]
    pub only_unread: bool,
    /// Maximum number of notifications (1..=100, default 50).
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    #[serde(default = "default_true")]
    pub is_read: bool,
}
