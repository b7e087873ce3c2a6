//! Best-effort HTTP calls to sibling services.
//!
//! Every call here may fail without affecting the caller: failures are logged
//! at `warn` and swallowed.

use std::{collections::HashMap, time::Duration};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

const PEER_TIMEOUT: Duration = Duration::from_secs(3);

/// Notification forwarded to the notification service.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: String,
    pub priority: String,
    pub metadata: Value,
}

/// Public profile fields used to decorate responses of other services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    notification_url: Option<String>,
    user_url: Option<String>,
}

impl PeerClient {
    pub fn new(notification_url: Option<String>, user_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PEER_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to build peer HTTP client; using defaults");
                reqwest::Client::new()
            });
        Self {
            http,
            notification_url: notification_url.map(|url| url.trim_end_matches('/').to_owned()),
            user_url: user_url.map(|url| url.trim_end_matches('/').to_owned()),
        }
    }

    /// Fire-and-forget delivery to the notification service.
    pub fn notify(&self, notification: OutboundNotification) {
        let Some(base) = self.notification_url.clone() else {
            debug!(user_id = %notification.user_id, "notification service not configured; skipping");
            return;
        };
        let http = self.http.clone();
        tokio::spawn(async move {
            let url = format!("{base}/api/v1/notifications");
            let outcome = http
                .post(&url)
                .json(&notification)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            if let Err(err) = outcome {
                warn!(user_id = %notification.user_id, error = %err, "failed to deliver notification");
            }
        });
    }

    /// Fetch public profiles for `user_ids`; unknown or failed lookups are omitted.
    pub async fn fetch_profiles(&self, user_ids: &[Uuid]) -> HashMap<Uuid, PeerProfile> {
        let Some(base) = self.user_url.as_deref() else {
            return HashMap::new();
        };

        let mut unique = user_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let lookups = unique.into_iter().map(|user_id| async move {
            let url = format!("{base}/api/v1/users/users/{user_id}");
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            let profile = match response {
                Ok(response) => response.json::<PeerProfile>().await,
                Err(err) => Err(err),
            };
            match profile {
                Ok(profile) => Some((user_id, profile)),
                Err(err) => {
                    warn!(%user_id, error = %err, "profile enrichment failed");
                    None
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_peers_are_no_ops() {
        let client = PeerClient::new(None, None);
        client.notify(OutboundNotification {
            user_id: Uuid::new_v4(),
            title: "t".into(),
            message: "m".into(),
            category: "general".into(),
            priority: "normal".into(),
            metadata: Value::Null,
        });
        assert!(client.fetch_profiles(&[Uuid::new_v4()]).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_user_service_yields_no_profiles() {
        let client = PeerClient::new(None, Some("http://127.0.0.1:9".into()));
        assert!(client.fetch_profiles(&[Uuid::new_v4()]).await.is_empty());
    }
}
