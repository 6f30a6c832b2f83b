use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    /// Free-form tag; producers in this workspace use [`NotificationKind`].
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Appointment or prescription the notification is about.
    #[serde(default)]
    pub related_id: Option<Uuid>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AppointmentRequest,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
    PrescriptionCreated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AppointmentRequest => "appointment_request",
            NotificationKind::AppointmentConfirmed => "appointment_confirmed",
            NotificationKind::AppointmentCancelled => "appointment_cancelled",
            NotificationKind::AppointmentRescheduled => "appointment_rescheduled",
            NotificationKind::PrescriptionCreated => "prescription_created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub related_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            related_id: None,
        }
    }

    pub fn related_to(mut self, id: Uuid) -> Self {
        self.related_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationInbox {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for NotificationError {
    fn from(err: anyhow::Error) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}
