use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    #[serde(default)]
    pub problem_description: String,
    pub farm_type: FarmType,
    #[serde(default)]
    pub urgency: Urgency,
    pub status: AppointmentStatus,
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub fee: f64,
    pub consultation_notes: Option<String>,
    /// Bumped by every status change or reschedule; guards compare-and-swap writes.
    #[serde(default)]
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Scheduled start, with the stored wall-clock date and time read as UTC.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.appointment_date, self.appointment_time).and_utc()
    }

    pub fn has_meeting_link(&self) -> bool {
        self.meeting_link
            .as_deref()
            .map(|link| !link.trim().is_empty())
            .unwrap_or(false)
    }

    /// The structured notes blob, when the notes hold one.
    pub fn structured_notes(&self) -> Option<Value> {
        self.consultation_notes
            .as_deref()
            .and_then(|notes| serde_json::from_str::<Value>(notes).ok())
            .filter(Value::is_object)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(alias = "payment_pending")]
    Pending,
    #[serde(alias = "accepted")]
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Every value the store may hold for this status, legacy aliases included.
    pub fn stored_forms(&self) -> &'static [&'static str] {
        match self {
            AppointmentStatus::Pending => &["pending", "payment_pending"],
            AppointmentStatus::Confirmed => &["confirmed", "accepted"],
            AppointmentStatus::Completed => &["completed"],
            AppointmentStatus::Cancelled => &["cancelled"],
        }
    }

    /// PostgREST `in.(...)` filter value matching any stored form of `statuses`.
    pub fn in_filter(statuses: &[AppointmentStatus]) -> String {
        let forms: Vec<&str> = statuses
            .iter()
            .flat_map(|status| status.stored_forms().iter().copied())
            .collect();
        format!("in.({})", forms.join(","))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "payment_pending" => Ok(AppointmentStatus::Pending),
            "confirmed" | "accepted" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            _ => Err(AppointmentError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FarmType {
    Rice,
    Vegetables,
    Fruits,
    Livestock,
    Poultry,
    Fish,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

/// An appointment as returned to clients, with the read-time join flag.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub can_join: bool,
}

impl AppointmentView {
    /// Detail body: structured notes are returned as an object, not a string.
    pub fn to_detail_json(&self) -> Value {
        let mut body = serde_json::json!(self);
        if let Some(notes) = self.appointment.structured_notes() {
            body["consultation_notes"] = notes;
        }
        body
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPage {
    pub appointments: Vec<AppointmentView>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ==============================================================================
// READINESS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    AwaitingConfirmation,
    NoMeetingLink,
    TooEarly,
    Open,
    Closed,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub appointment_id: Uuid,
    pub can_join: bool,
    pub state: ReadinessState,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub problem_description: Option<String>,
    pub farm_type: Option<FarmType>,
    pub urgency: Option<Urgency>,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    /// Kept as text so unknown values surface as a 400, not a body rejection.
    pub status: String,
    /// Lets the doctor attach the meeting link when accepting.
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationNotesRequest {
    pub consultation_notes: String,
    pub prescription: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub problem_description: Option<String>,
    pub urgency: Option<Urgency>,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Accepts `HH:MM` as well as `HH:MM:SS`.
pub fn parse_appointment_time(raw: &str) -> Result<NaiveTime, AppointmentError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| AppointmentError::ValidationError(format!("Invalid appointment time: {}", raw)))
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Farmer profile not found")]
    FarmerNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor profile not found")]
    DoctorProfileNotFound,

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("You already have a pending appointment with this doctor at this time")]
    DuplicateBooking,

    #[error("Appointment was modified concurrently, please reload and retry")]
    ConcurrentModification,

    #[error("Only pending appointments can be changed (current status: {0})")]
    NotEditable(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}
