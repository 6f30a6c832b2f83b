use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Notification, NotificationError, NotificationInbox, NotificationListQuery};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 100;

pub struct NotificationService {
    supabase: SupabaseClient,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// The caller's notifications, newest first, plus their unread count.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        query: NotificationListQuery,
        auth_token: &str,
    ) -> Result<NotificationInbox, NotificationError> {
        debug!("Listing notifications for user {}", user_id);

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let mut path = format!("/rest/v1/notifications?user_id=eq.{}", user_id);
        if query.unread_only.unwrap_or(false) {
            path.push_str("&is_read=eq.false");
        }
        path.push_str(&format!("&order=created_at.desc&limit={}", limit));

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let notifications = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Notification>, _>>()?;

        let unread_path = format!(
            "/rest/v1/notifications?user_id=eq.{}&is_read=eq.false&select=id&limit=1",
            user_id
        );
        let (_, unread_count) = self.supabase
            .request_with_count::<Value>(&unread_path, Some(auth_token))
            .await?;

        Ok(NotificationInbox { notifications, unread_count })
    }

    /// Marks one of the caller's notifications read. Someone else's
    /// notification is reported as not found.
    pub async fn mark_read(
        &self,
        notification_id: &Uuid,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Notification, NotificationError> {
        let path = format!("/rest/v1/notifications?id=eq.{}&user_id=eq.{}", notification_id, user_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows.into_iter().next().ok_or(NotificationError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn mark_all_read(&self, user_id: &str, auth_token: &str) -> Result<usize, NotificationError> {
        let path = format!("/rest/v1/notifications?user_id=eq.{}&is_read=eq.false", user_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        info!("Marked {} notifications read for user {}", rows.len(), user_id);
        Ok(rows.len())
    }
}
