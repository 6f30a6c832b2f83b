use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::{User, UserRole};
use doctor_cell::{Doctor, DoctorService};
use farmer_cell::{Farmer, FarmerError, FarmerService};
use notification_cell::{NewNotification, NotificationDispatcher, NotificationKind};

use crate::models::{
    CreatePrescriptionRequest, Prescription, PrescriptionDraft, PrescriptionError,
    StandalonePrescriptionRequest,
};
use crate::services::number::{generate_prescription_no, PrescriptionRef};

/// Attempts at a fresh number before giving up on unique-constraint conflicts.
const MAX_NUMBER_ATTEMPTS: usize = 5;

/// Who is reading prescriptions.
#[derive(Debug, Clone)]
pub enum Viewer {
    Doctor(Doctor),
    Farmer(Farmer),
}

impl Viewer {
    pub fn can_view(&self, prescription: &Prescription) -> bool {
        match self {
            Viewer::Doctor(doctor) => prescription.doctor_id == Some(doctor.id),
            Viewer::Farmer(farmer) => prescription.farmer_id == Some(farmer.id),
        }
    }
}

/// Names the referenced row a foreign-key rejection points at.
fn missing_reference(err: &anyhow::Error) -> PrescriptionError {
    let message = SupabaseError::conflict_message(err).unwrap_or_default();
    if message.contains("farmer_id") {
        PrescriptionError::FarmerNotFound
    } else if message.contains("appointment_id") {
        PrescriptionError::AppointmentNotFound
    } else if message.contains("doctor_id") {
        PrescriptionError::DoctorProfileNotFound
    } else {
        PrescriptionError::DatabaseError(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct AppointmentOwnership {
    farmer_id: Uuid,
}

pub struct PrescriptionService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    farmers: FarmerService,
    dispatcher: NotificationDispatcher,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            farmers: FarmerService::new(config),
            dispatcher: NotificationDispatcher::new(config),
        }
    }

    pub async fn resolve_doctor(&self, user: &User, auth_token: &str) -> Result<Doctor, PrescriptionError> {
        self.doctors
            .find_by_user_id(&user.id, auth_token)
            .await?
            .ok_or(PrescriptionError::DoctorProfileNotFound)
    }

    pub async fn resolve_viewer(&self, user: &User, auth_token: &str) -> Result<Viewer, PrescriptionError> {
        match user.user_role() {
            Some(UserRole::Doctor) => Ok(Viewer::Doctor(self.resolve_doctor(user, auth_token).await?)),
            Some(UserRole::Farmer) => self.farmers
                .find_by_user_id(&user.id, auth_token)
                .await
                .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?
                .map(Viewer::Farmer)
                .ok_or(PrescriptionError::FarmerNotFound),
            _ => Err(PrescriptionError::Forbidden(
                "Only doctors and farmers have prescriptions".to_string(),
            )),
        }
    }

    /// Prescription for one of `doctor`'s own appointments.
    pub async fn create_for_appointment(
        &self,
        doctor: &Doctor,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&select=farmer_id",
            request.appointment_id, doctor.id
        );
        let rows: Vec<AppointmentOwnership> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        let ownership = rows.into_iter().next().ok_or(PrescriptionError::AppointmentNotFound)?;

        let draft = PrescriptionDraft::linked(request, ownership.farmer_id)?;
        self.issue(doctor, draft, auth_token).await
    }

    /// Prescription issued to any farmer without a scheduled appointment.
    pub async fn create_standalone(
        &self,
        doctor: &Doctor,
        request: StandalonePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let draft = PrescriptionDraft::standalone(request)?;
        self.issue(doctor, draft, auth_token).await
    }

    async fn issue(
        &self,
        doctor: &Doctor,
        draft: PrescriptionDraft,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let farmer = match self.farmers.get_farmer(&draft.farmer_id.to_string(), auth_token).await {
            Ok(farmer) => farmer,
            Err(FarmerError::NotFound) => return Err(PrescriptionError::FarmerNotFound),
            Err(e) => return Err(PrescriptionError::DatabaseError(e.to_string())),
        };

        let prescription = self.insert_with_fresh_number(doctor, &draft, auth_token).await?;
        info!("Prescription {} issued by doctor {} to farmer {}",
              prescription.prescription_no, doctor.id, farmer.id);

        self.dispatcher.notify(
            NewNotification::new(
                farmer.user_id,
                NotificationKind::PrescriptionCreated,
                "New Prescription",
                format!(
                    "Dr. {} has created a new prescription for you. Prescription No: {}",
                    doctor.display_name().trim_start_matches("Dr. "),
                    prescription.prescription_no,
                ),
            ).related_to(prescription.id),
            auth_token,
        ).await;

        Ok(prescription)
    }

    async fn insert_with_fresh_number(
        &self,
        doctor: &Doctor,
        draft: &PrescriptionDraft,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let prescription_no = generate_prescription_no();
            let body = json!({
                "prescription_no": prescription_no,
                "appointment_id": draft.appointment_id,
                "doctor_id": doctor.id,
                "farmer_id": draft.farmer_id,
                "diagnosis": draft.diagnosis,
                "treatment": draft.treatment,
                "medicines": draft.items,
                "instructions": draft.instructions,
                "follow_up_date": draft.follow_up_date,
                "notes": draft.notes
            });

            let result = self.supabase.request_with_headers::<Vec<Value>>(
                Method::POST,
                "/rest/v1/prescriptions",
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            ).await;

            match result {
                Ok(rows) => {
                    let row = rows
                        .into_iter()
                        .next()
                        .ok_or_else(|| PrescriptionError::DatabaseError("Failed to create prescription".to_string()))?;
                    return Ok(serde_json::from_value(row)?);
                }
                Err(e) if SupabaseError::is_unique_violation(&e) => {
                    warn!("Prescription number {} already taken (attempt {}/{})",
                          prescription_no, attempt, MAX_NUMBER_ATTEMPTS);
                }
                Err(e) if SupabaseError::is_foreign_key_violation(&e) => {
                    warn!("Prescription {} references a row that no longer exists: {}", prescription_no, e);
                    return Err(missing_reference(&e));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PrescriptionError::NumberExhausted)
    }

    pub async fn list_for_farmer(&self, farmer: &Farmer, auth_token: &str) -> Result<Vec<Prescription>, PrescriptionError> {
        let path = format!("/rest/v1/prescriptions?farmer_id=eq.{}&order=created_at.desc", farmer.id);
        self.list(&path, auth_token).await
    }

    pub async fn list_for_doctor(&self, doctor: &Doctor, auth_token: &str) -> Result<Vec<Prescription>, PrescriptionError> {
        let path = format!("/rest/v1/prescriptions?doctor_id=eq.{}&order=created_at.desc", doctor.id);
        self.list(&path, auth_token).await
    }

    async fn list(&self, path: &str, auth_token: &str) -> Result<Vec<Prescription>, PrescriptionError> {
        debug!("Listing prescriptions: {}", path);
        let prescriptions: Vec<Prescription> = self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;
        Ok(prescriptions)
    }

    /// Only the prescribing doctor and the farmer see a prescription.
    pub async fn get(
        &self,
        viewer: &Viewer,
        reference: &PrescriptionRef,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let path = match reference {
            PrescriptionRef::Id(id) => format!("/rest/v1/prescriptions?id=eq.{}", id),
            PrescriptionRef::Number(number) => format!("/rest/v1/prescriptions?prescription_no=eq.{}", number),
        };
        let rows: Vec<Prescription> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .next()
            .filter(|prescription| viewer.can_view(prescription))
            .ok_or(PrescriptionError::NotFound)
    }
}
