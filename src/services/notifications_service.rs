use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{now_millis, notifications::Notification},
    },
    dto::notifications::{CreateNotificationRequest, NotificationResponse},
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "notifications";

pub async fn create_notification(
    state: &SharedState,
    request: CreateNotificationRequest,
) -> Result<NotificationResponse, ServiceError> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        title: request.title,
        message: request.message,
        category: request.category,
        priority: request.priority,
        delivered_via: request.delivered_via,
        metadata: match request.metadata {
            Value::Null => json!({}),
            metadata => metadata,
        },
        is_read: false,
        read_at: None,
        created_at: now_millis(),
    };
    state
        .repo::<Notification>()
        .await?
        .insert(&notification)
        .await?;

    state.events().publish(
        TOPIC,
        "notification.created",
        json!({
            "notification_id": notification.id,
            "user_id": notification.user_id,
            "category": notification.category,
        }),
    );
    Ok(notification.into())
}

/// Newest notifications of a user.
pub async fn user_notifications(
    state: &SharedState,
    user_id: Uuid,
    only_unread: bool,
    limit: u64,
) -> Result<Vec<NotificationResponse>, ServiceError> {
    let mut filter = Filter::id("user_id", user_id);
    if only_unread {
        filter = filter.and(Filter::eq("is_read", false));
    }
    let notifications = state
        .repo::<Notification>()
        .await?
        .find(Query::new(filter).sort_desc("created_at").limit(limit))
        .await?;
    Ok(notifications.into_iter().map(Into::into).collect())
}

/// Toggle the read flag; `read_at` follows it.
pub async fn mark_read(
    state: &SharedState,
    id: Uuid,
    is_read: bool,
) -> Result<NotificationResponse, ServiceError> {
    let notifications = state.repo::<Notification>().await?;
    let mut notification = notifications
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("notification"))?;
    notification.is_read = is_read;
    notification.read_at = is_read.then(now_millis);
    notifications.replace(&notification).await?;

    state.events().publish(
        TOPIC,
        "notification.read_changed",
        json!({ "notification_id": id, "is_read": is_read }),
    );
    Ok(notification.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::notifications::NotificationPriority, state::test_support::memory_state,
    };

    fn note(user_id: Uuid, title: &str) -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id,
            title: title.into(),
            message: "hello".into(),
            category: "system".into(),
            priority: NotificationPriority::High,
            delivered_via: vec!["in_app".into()],
            metadata: Value::Null,
        }
    }

    #[tokio::test]
    async fn unread_filter_and_read_toggle() {
        let state = memory_state().await;
        let user = Uuid::new_v4();
        let first = create_notification(&state, note(user, "first")).await.unwrap();
        create_notification(&state, note(user, "second")).await.unwrap();
        create_notification(&state, note(Uuid::new_v4(), "other")).await.unwrap();
        assert_eq!(first.metadata, json!({}));

        let read = mark_read(&state, first.id, true).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());

        let unread = user_notifications(&state, user, true, 50).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "second");
        assert_eq!(user_notifications(&state, user, false, 50).await.unwrap().len(), 2);

        let unread_again = mark_read(&state, first.id, false).await.unwrap();
        assert!(unread_again.read_at.is_none());
    }
}
