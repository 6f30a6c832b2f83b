use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentStatRow, Doctor, DoctorStats, Specialization};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 100;

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Verified doctors, best rated first.
    pub async fn list_verified(
        &self,
        specialization: Option<Specialization>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Doctor>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let mut path = String::from("/rest/v1/doctors?is_verified=eq.true");
        if let Some(specialization) = specialization {
            path.push_str(&format!("&specialization=eq.{}", specialization));
        }
        path.push_str(&format!("&order=rating.desc&limit={}&offset={}", limit, offset));

        debug!("Listing verified doctors: {}", path);

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        let doctors = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()?;

        Ok(doctors)
    }

    pub async fn get_doctor(
        &self,
        doctor_id: &Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<Doctor>> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Resolves the doctor profile owned by an authenticated user.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Doctor>> {
        debug!("Resolving doctor profile for user {}", user_id);

        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Store-side `total_consultations + 1`; returns the new count.
    pub async fn increment_total_consultations(
        &self,
        doctor_id: &Uuid,
        auth_token: &str,
    ) -> Result<i64> {
        let count: Value = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/increment_doctor_consultations",
            Some(auth_token),
            Some(json!({ "p_doctor_id": doctor_id })),
        ).await?;

        let count = count
            .as_i64()
            .ok_or_else(|| anyhow!("Unexpected counter response: {}", count))?;

        info!("Doctor {} total consultations now {}", doctor_id, count);
        Ok(count)
    }

    pub async fn verify_doctor(
        &self,
        doctor_id: &Uuid,
        auth_token: &str,
    ) -> Result<Option<Doctor>> {
        debug!("Verifying doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_verified": true })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        match result.into_iter().next() {
            Some(row) => {
                let doctor: Doctor = serde_json::from_value(row)?;
                info!("Doctor {} verified", doctor.id);
                Ok(Some(doctor))
            }
            None => Ok(None),
        }
    }

    /// Applies admin edits; `None` when no doctor has that id.
    pub async fn update_doctor(
        &self,
        doctor_id: &Uuid,
        changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Option<Doctor>> {
        debug!("Admin update of doctor {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(changes)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        match result.into_iter().next() {
            Some(row) => {
                let doctor: Doctor = serde_json::from_value(row)?;
                info!("Doctor {} updated by admin", doctor.id);
                Ok(Some(doctor))
            }
            None => Ok(None),
        }
    }

    /// Deletes the doctor's user row; the profile and its appointments
    /// cascade, prescriptions keep their history with `doctor_id` nulled.
    pub async fn delete_doctor(&self, doctor_id: &Uuid, auth_token: &str) -> Result<Option<Doctor>> {
        let Some(doctor) = self.get_doctor(doctor_id, Some(auth_token)).await? else {
            return Ok(None);
        };

        let path = format!("/rest/v1/users?id=eq.{}", doctor.user_id);
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Ok(None);
        }

        info!("Doctor {} and user {} deleted", doctor.id, doctor.user_id);
        Ok(Some(doctor))
    }

    pub async fn get_dashboard_stats(
        &self,
        doctor: &Doctor,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<DoctorStats> {
        debug!("Computing dashboard statistics for doctor {}", doctor.id);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&select=status,appointment_date,fee",
            doctor.id
        );
        let rows: Vec<AppointmentStatRow> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(DoctorStats::from_rows(&rows, today, doctor.total_consultations))
    }
}
