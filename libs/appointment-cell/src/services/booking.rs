use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{User, UserRole};
use doctor_cell::{Doctor, DoctorService};
use farmer_cell::{Farmer, FarmerService};
use notification_cell::{NewNotification, NotificationDispatcher, NotificationKind};

use crate::models::{
    parse_appointment_time, Appointment, AppointmentError, AppointmentListQuery, AppointmentPage,
    AppointmentStatus, AppointmentView, ConsultationNotesRequest, FarmType, ReadinessReport,
    RequestAppointmentRequest, RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::lifecycle::{Actor, AppointmentLifecycleService, Recipient, SideEffect};
use crate::services::readiness::ConsultationWindow;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Statuses that hold a slot for duplicate-booking purposes.
const ACTIVE_STATUSES: [AppointmentStatus; 2] = [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

/// The caller, resolved to the profile they act through.
#[derive(Debug, Clone)]
pub enum Party {
    Doctor(Doctor),
    Farmer(Farmer),
    Admin,
}

impl Party {
    pub fn owns(&self, appointment: &Appointment) -> bool {
        match self {
            Party::Doctor(doctor) => appointment.doctor_id == doctor.id,
            Party::Farmer(farmer) => appointment.farmer_id == farmer.id,
            Party::Admin => false,
        }
    }

    /// Admins see every appointment; everybody else only their own.
    pub fn can_view(&self, appointment: &Appointment) -> bool {
        matches!(self, Party::Admin) || self.owns(appointment)
    }

    pub fn actor(&self) -> Option<Actor> {
        match self {
            Party::Doctor(_) => Some(Actor::Doctor),
            Party::Farmer(_) => Some(Actor::Farmer),
            Party::Admin => None,
        }
    }
}

struct ValidatedRequest {
    doctor_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    problem_description: String,
    farm_type: FarmType,
}

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    farmers: FarmerService,
    dispatcher: NotificationDispatcher,
    lifecycle: AppointmentLifecycleService,
    window: ConsultationWindow,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            farmers: FarmerService::new(config),
            dispatcher: NotificationDispatcher::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            window: ConsultationWindow::default(),
        }
    }

    pub async fn resolve_party(&self, user: &User, auth_token: &str) -> Result<Party, AppointmentError> {
        match user.user_role() {
            Some(UserRole::Doctor) => self.doctors
                .find_by_user_id(&user.id, auth_token)
                .await?
                .map(Party::Doctor)
                .ok_or(AppointmentError::DoctorProfileNotFound),
            Some(UserRole::Farmer) => self.farmers
                .find_by_user_id(&user.id, auth_token)
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
                .map(Party::Farmer)
                .ok_or(AppointmentError::FarmerNotFound),
            Some(UserRole::Admin) => Ok(Party::Admin),
            None => Err(AppointmentError::Forbidden("Access denied".to_string())),
        }
    }

    /// A farmer asks a doctor for a consultation slot. The new appointment is
    /// `pending` and the doctor is told about it.
    pub async fn request_appointment(
        &self,
        farmer: &Farmer,
        request: RequestAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let validated = Self::validate_request(&request)?;
        info!("Farmer {} requesting appointment with doctor {} on {} {}",
              farmer.id, validated.doctor_id, validated.date, validated.time);

        let doctor = self.doctors
            .get_doctor(&validated.doctor_id, Some(auth_token))
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        if self.has_duplicate_booking(farmer.id, doctor.id, validated.date, validated.time, None, auth_token).await? {
            warn!("Duplicate booking rejected for farmer {} with doctor {} at {} {}",
                  farmer.id, doctor.id, validated.date, validated.time);
            return Err(AppointmentError::DuplicateBooking);
        }

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "farmer_id": farmer.id,
            "doctor_id": doctor.id,
            "appointment_date": validated.date,
            "appointment_time": validated.time.format("%H:%M:%S").to_string(),
            "problem_description": validated.problem_description,
            "farm_type": validated.farm_type,
            "urgency": request.urgency.unwrap_or_default(),
            "status": AppointmentStatus::Pending,
            "meeting_link": non_blank(request.meeting_link),
            "fee": 0.0,
            "version": 1,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;
        let appointment: Appointment = serde_json::from_value(row)?;

        info!("Appointment {} created for farmer {} with doctor {}", appointment.id, farmer.id, doctor.id);

        self.dispatcher.notify(
            NewNotification::new(
                doctor.user_id,
                NotificationKind::AppointmentRequest,
                "New Appointment Request",
                format!(
                    "New appointment request from {}. Date: {} {}",
                    farmer.farmer_name,
                    appointment.appointment_date,
                    appointment.appointment_time.format("%H:%M"),
                ),
            ).related_to(appointment.id),
            auth_token,
        ).await;

        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        party: &Party,
        query: AppointmentListQuery,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AppointmentPage, AppointmentError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut filters = Vec::new();
        match party {
            Party::Doctor(doctor) => filters.push(format!("doctor_id=eq.{}", doctor.id)),
            Party::Farmer(farmer) => filters.push(format!("farmer_id=eq.{}", farmer.id)),
            Party::Admin => {}
        }
        if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            let status: AppointmentStatus = status.parse()?;
            filters.push(format!("status={}", AppointmentStatus::in_filter(&[status])));
        }
        if let Some(date) = query.date {
            filters.push(format!("appointment_date=eq.{}", date));
        }
        filters.push("order=appointment_date.asc,appointment_time.asc".to_string());
        filters.push(format!("limit={}&offset={}", limit, offset));

        let path = format!("/rest/v1/appointments?{}", filters.join("&"));
        debug!("Listing appointments: {}", path);

        let (appointments, total) = self.supabase
            .request_with_count::<Appointment>(&path, Some(auth_token))
            .await?;

        let appointments = appointments
            .into_iter()
            .map(|appointment| AppointmentView {
                can_join: self.window.is_joinable(&appointment, now),
                appointment,
            })
            .collect();

        Ok(AppointmentPage { appointments, total, limit, offset })
    }

    pub async fn get_appointment(
        &self,
        party: &Party,
        appointment_id: &Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.load_visible(party, appointment_id, auth_token).await
    }

    pub fn view(&self, appointment: Appointment, now: DateTime<Utc>) -> AppointmentView {
        AppointmentView {
            can_join: self.window.is_joinable(&appointment, now),
            appointment,
        }
    }

    /// Moves an appointment along the lifecycle. The write is a
    /// compare-and-swap on `(status, version)`; side effects run only after
    /// it commits and never undo it.
    pub async fn transition_status(
        &self,
        party: &Party,
        appointment_id: &Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let new_status: AppointmentStatus = request.status.parse()?;
        let actor = party.actor().ok_or_else(|| {
            AppointmentError::Forbidden("Only the doctor or farmer of an appointment can change its status".to_string())
        })?;

        let current = self.load_visible(party, appointment_id, auth_token).await?;

        self.lifecycle.authorize_transition(actor, &new_status)?;
        self.lifecycle.validate_status_transition(&current.status, &new_status)?;

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(new_status));
        if new_status == AppointmentStatus::Confirmed {
            if let Some(link) = non_blank(request.meeting_link) {
                changes.insert("meeting_link".to_string(), json!(link));
            }
        }

        let updated = self.compare_and_swap(&current, changes, auth_token).await?;
        info!("Appointment {} moved {} -> {} by {:?}", updated.id, current.status, updated.status, actor);

        let effects = self.lifecycle.side_effects(actor, &new_status);
        self.apply_side_effects(party, &updated, effects, auth_token).await;

        Ok(updated)
    }

    /// Overwrites the notes; last write wins.
    pub async fn add_consultation_notes(
        &self,
        doctor: &Doctor,
        appointment_id: &Uuid,
        request: ConsultationNotesRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.consultation_notes.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Consultation notes are required".to_string()));
        }

        let party = Party::Doctor(doctor.clone());
        self.load_visible(&party, appointment_id, auth_token).await?;

        let now = Utc::now().to_rfc3339();
        let stored_notes = match request.prescription {
            Some(prescription) if !prescription.is_null() => json!({
                "consultation_notes": request.consultation_notes,
                "prescription": prescription,
                "updated_at": now,
                "doctor_id": doctor.id
            }).to_string(),
            _ => request.consultation_notes,
        };

        let path = format!("/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}", appointment_id, doctor.id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "consultation_notes": stored_notes,
                "updated_at": now
            })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        let appointment: Appointment = serde_json::from_value(row)?;
        info!("Consultation notes saved for appointment {}", appointment.id);

        Ok(appointment)
    }

    /// Farmer moves a still-pending request to another slot.
    pub async fn reschedule_appointment(
        &self,
        farmer: &Farmer,
        appointment_id: &Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let party = Party::Farmer(farmer.clone());
        let current = self.load_visible(&party, appointment_id, auth_token).await?;

        if current.status != AppointmentStatus::Pending {
            return Err(AppointmentError::NotEditable(current.status));
        }

        let time = parse_appointment_time(&request.appointment_time)?;
        if self.has_duplicate_booking(
            farmer.id,
            current.doctor_id,
            request.appointment_date,
            time,
            Some(current.id),
            auth_token,
        ).await? {
            return Err(AppointmentError::DuplicateBooking);
        }

        let mut changes = Map::new();
        changes.insert("appointment_date".to_string(), json!(request.appointment_date));
        changes.insert("appointment_time".to_string(), json!(time.format("%H:%M:%S").to_string()));
        if let Some(description) = request.problem_description.filter(|d| !d.trim().is_empty()) {
            changes.insert("problem_description".to_string(), json!(description.trim()));
        }
        if let Some(urgency) = request.urgency {
            changes.insert("urgency".to_string(), json!(urgency));
        }
        if let Some(link) = non_blank(request.meeting_link) {
            changes.insert("meeting_link".to_string(), json!(link));
        }

        let updated = self.compare_and_swap(&current, changes, auth_token).await?;
        info!("Appointment {} rescheduled to {} {}", updated.id, updated.appointment_date, updated.appointment_time);

        if let Some(doctor_user_id) = self.recipient_user_id(Recipient::Doctor, &party, &updated, auth_token).await {
            self.dispatcher.notify(
                NewNotification::new(
                    doctor_user_id,
                    NotificationKind::AppointmentRescheduled,
                    "Appointment Rescheduled",
                    format!(
                        "{} moved their appointment to {} {}",
                        farmer.farmer_name,
                        updated.appointment_date,
                        updated.appointment_time.format("%H:%M"),
                    ),
                ).related_to(updated.id),
                auth_token,
            ).await;
        }

        Ok(updated)
    }

    /// Hard delete, allowed only while the appointment is still pending.
    pub async fn delete_appointment(
        &self,
        party: &Party,
        appointment_id: &Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        if matches!(party, Party::Doctor(_)) {
            return Err(AppointmentError::Forbidden("Doctors cannot delete appointments".to_string()));
        }

        let current = self.load_visible(party, appointment_id, auth_token).await?;
        if current.status != AppointmentStatus::Pending {
            return Err(AppointmentError::NotEditable(current.status));
        }

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status={}&version=eq.{}",
            current.id,
            AppointmentStatus::in_filter(&[AppointmentStatus::Pending]),
            current.version,
        );
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            warn!("Appointment {} changed before it could be deleted", current.id);
            return Err(AppointmentError::ConcurrentModification);
        }

        info!("Appointment {} deleted", current.id);
        Ok(())
    }

    pub async fn readiness(
        &self,
        party: &Party,
        appointment_id: &Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<ReadinessReport, AppointmentError> {
        let appointment = self.load_visible(party, appointment_id, auth_token).await?;
        Ok(self.window.report(&appointment, now))
    }

    // ==============================================================================
    // STORE HELPERS
    // ==============================================================================

    /// Missing and not-yours are the same answer.
    async fn load_visible(
        &self,
        party: &Party,
        appointment_id: &Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        let appointment: Appointment = serde_json::from_value(row)?;

        if !party.can_view(&appointment) {
            debug!("Appointment {} hidden from non-owner", appointment_id);
            return Err(AppointmentError::NotFound);
        }

        Ok(appointment)
    }

    async fn compare_and_swap(
        &self,
        current: &Appointment,
        mut changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        changes.insert("version".to_string(), json!(current.version + 1));
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status={}&version=eq.{}",
            current.id,
            AppointmentStatus::in_filter(&[current.status]),
            current.version,
        );

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(changes)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => {
                warn!("Lost update race on appointment {} at version {}", current.id, current.version);
                Err(AppointmentError::ConcurrentModification)
            }
        }
    }

    async fn has_duplicate_booking(
        &self,
        farmer_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?farmer_id=eq.{}&doctor_id=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}&status={}&select=id",
            farmer_id,
            doctor_id,
            date,
            time.format("%H:%M:%S"),
            AppointmentStatus::in_filter(&ACTIVE_STATUSES),
        );
        if let Some(exclude) = exclude {
            path.push_str(&format!("&id=neq.{}", exclude));
        }

        let existing: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(!existing.is_empty())
    }

    // ==============================================================================
    // SIDE EFFECTS
    // ==============================================================================

    async fn apply_side_effects(
        &self,
        party: &Party,
        appointment: &Appointment,
        effects: Vec<SideEffect>,
        auth_token: &str,
    ) {
        for effect in effects {
            match effect {
                SideEffect::IncrementDoctorConsultations => {
                    if let Err(e) = self.doctors
                        .increment_total_consultations(&appointment.doctor_id, auth_token)
                        .await
                    {
                        warn!("Failed to increment consultations for doctor {}: {}", appointment.doctor_id, e);
                    }
                }
                SideEffect::Notify { recipient, kind } => {
                    let Some(user_id) = self.recipient_user_id(recipient, party, appointment, auth_token).await else {
                        continue;
                    };
                    let (title, message) = status_notification_text(kind, recipient, appointment);
                    self.dispatcher.notify(
                        NewNotification::new(user_id, kind, title, message).related_to(appointment.id),
                        auth_token,
                    ).await;
                }
            }
        }
    }

    async fn recipient_user_id(
        &self,
        recipient: Recipient,
        party: &Party,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Option<Uuid> {
        match (recipient, party) {
            (Recipient::Doctor, Party::Doctor(doctor)) => Some(doctor.user_id),
            (Recipient::Farmer, Party::Farmer(farmer)) => Some(farmer.user_id),
            (Recipient::Doctor, _) => match self.doctors.get_doctor(&appointment.doctor_id, Some(auth_token)).await {
                Ok(Some(doctor)) => Some(doctor.user_id),
                Ok(None) => {
                    warn!("Doctor {} missing, notification skipped", appointment.doctor_id);
                    None
                }
                Err(e) => {
                    warn!("Doctor lookup for notification failed: {}", e);
                    None
                }
            },
            (Recipient::Farmer, _) => match self.farmers.get_farmer(&appointment.farmer_id.to_string(), auth_token).await {
                Ok(farmer) => Some(farmer.user_id),
                Err(e) => {
                    warn!("Farmer lookup for notification failed: {}", e);
                    None
                }
            },
        }
    }

    fn validate_request(request: &RequestAppointmentRequest) -> Result<ValidatedRequest, AppointmentError> {
        let doctor_id = request.doctor_id
            .ok_or_else(|| AppointmentError::ValidationError("Please select a doctor".to_string()))?;
        let date = request.appointment_date
            .ok_or_else(|| AppointmentError::ValidationError("Appointment date is required".to_string()))?;
        let time = request.appointment_time
            .as_deref()
            .ok_or_else(|| AppointmentError::ValidationError("Appointment time is required".to_string()))
            .and_then(parse_appointment_time)?;
        let problem_description = request.problem_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppointmentError::ValidationError("Problem description is required".to_string()))?
            .to_string();
        let farm_type = request.farm_type
            .ok_or_else(|| AppointmentError::ValidationError("Farm type is required".to_string()))?;

        Ok(ValidatedRequest { doctor_id, date, time, problem_description, farm_type })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn status_notification_text(
    kind: NotificationKind,
    recipient: Recipient,
    appointment: &Appointment,
) -> (String, String) {
    let slot = format!("{} {}", appointment.appointment_date, appointment.appointment_time.format("%H:%M"));

    match (kind, recipient) {
        (NotificationKind::AppointmentConfirmed, _) => (
            "Appointment confirmed".to_string(),
            format!("Your appointment on {} has been confirmed", slot),
        ),
        (NotificationKind::AppointmentCancelled, Recipient::Farmer) => (
            "Appointment cancelled".to_string(),
            format!("Your appointment on {} has been cancelled", slot),
        ),
        (NotificationKind::AppointmentCancelled, Recipient::Doctor) => (
            "Appointment cancelled".to_string(),
            format!("The farmer cancelled the appointment on {}", slot),
        ),
        (other, _) => (
            "Appointment updated".to_string(),
            format!("Appointment on {} updated ({})", slot, other.as_str()),
        ),
    }
}
