use anyhow::{Result, anyhow};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{NewNotification, Notification};

/// Appends notification rows on behalf of other operations.
///
/// Delivery is best-effort: a failed write is logged and reported as `None`,
/// never as an error, so the triggering operation keeps its outcome.
pub struct NotificationDispatcher {
    supabase: SupabaseClient,
}

impl NotificationDispatcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn notify(&self, notification: NewNotification, auth_token: &str) -> Option<Notification> {
        let kind = notification.kind.as_str();
        let recipient = notification.user_id;

        match self.insert(notification, auth_token).await {
            Ok(created) => {
                debug!("Notification {} ({}) queued for user {}", created.id, kind, recipient);
                Some(created)
            }
            Err(e) => {
                warn!("Failed to create {} notification for user {}: {}", kind, recipient, e);
                None
            }
        }
    }

    async fn insert(&self, notification: NewNotification, auth_token: &str) -> Result<Notification> {
        let body = json!({
            "user_id": notification.user_id,
            "title": notification.title,
            "message": notification.message,
            "type": notification.kind.as_str(),
            "related_id": notification.related_id,
            "is_read": false
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/notifications",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Store returned no notification row"))?;

        Ok(serde_json::from_value(row)?)
    }
}
