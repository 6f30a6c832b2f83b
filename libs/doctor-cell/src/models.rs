use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;
use chrono::{NaiveDate, NaiveTime, Weekday};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    CropDiseases,
    PestManagement,
    SoilFertility,
    PlantNutrition,
    LivestockHealth,
    OrganicFarming,
}

impl Specialization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::CropDiseases => "crop_diseases",
            Specialization::PestManagement => "pest_management",
            Specialization::SoilFertility => "soil_fertility",
            Specialization::PlantNutrition => "plant_nutrition",
            Specialization::LivestockHealth => "livestock_health",
            Specialization::OrganicFarming => "organic_farming",
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialization {
    type Err = DoctorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "crop_diseases" => Ok(Specialization::CropDiseases),
            "pest_management" => Ok(Specialization::PestManagement),
            "soil_fertility" => Ok(Specialization::SoilFertility),
            "plant_nutrition" => Ok(Specialization::PlantNutrition),
            "livestock_health" => Ok(Specialization::LivestockHealth),
            "organic_farming" => Ok(Specialization::OrganicFarming),
            other => Err(DoctorError::ValidationError(format!("Unknown specialization: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub qualification: Option<String>,
    pub specialization: Specialization,
    pub experience_years: Option<i32>,
    pub workplace: Option<String>,
    pub license_number: Option<String>,
    pub available_time_start: Option<NaiveTime>,
    pub available_time_end: Option<NaiveTime>,
    #[serde(default)]
    pub available_days: Vec<String>,
    #[serde(default)]
    pub consultation_fee: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub total_consultations: i32,
    #[serde(default)]
    pub is_verified: bool,
}

impl Doctor {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Doctor")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorListQuery {
    pub specialization: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Admin edit of a doctor profile; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub qualification: Option<String>,
    pub specialization: Option<Specialization>,
    pub experience_years: Option<i32>,
    pub workplace: Option<String>,
    pub license_number: Option<String>,
    pub available_time_start: Option<NaiveTime>,
    pub available_time_end: Option<NaiveTime>,
    pub available_days: Option<Vec<String>>,
    pub consultation_fee: Option<f64>,
}

impl UpdateDoctorRequest {
    /// Column changes for the PATCH body. Weekdays are stored as lowercase
    /// full names whatever spelling the client sent.
    pub fn into_changes(self) -> Result<Map<String, Value>, DoctorError> {
        let mut changes = Map::new();

        if let Some(full_name) = self.full_name {
            if full_name.trim().is_empty() {
                return Err(DoctorError::ValidationError("Doctor name cannot be empty".to_string()));
            }
            changes.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(qualification) = self.qualification {
            changes.insert("qualification".to_string(), json!(qualification));
        }
        if let Some(specialization) = self.specialization {
            changes.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(experience_years) = self.experience_years {
            if experience_years < 0 {
                return Err(DoctorError::ValidationError("Experience years cannot be negative".to_string()));
            }
            changes.insert("experience_years".to_string(), json!(experience_years));
        }
        if let Some(workplace) = self.workplace {
            changes.insert("workplace".to_string(), json!(workplace));
        }
        if let Some(license_number) = self.license_number {
            changes.insert("license_number".to_string(), json!(license_number));
        }
        if let (Some(start), Some(end)) = (self.available_time_start, self.available_time_end) {
            if start >= end {
                return Err(DoctorError::ValidationError(
                    "Available time start must be before available time end".to_string(),
                ));
            }
        }
        if let Some(start) = self.available_time_start {
            changes.insert("available_time_start".to_string(), json!(start));
        }
        if let Some(end) = self.available_time_end {
            changes.insert("available_time_end".to_string(), json!(end));
        }
        if let Some(days) = self.available_days {
            let days = days
                .iter()
                .map(|day| {
                    day.trim()
                        .parse::<Weekday>()
                        .map(weekday_name)
                        .map_err(|_| DoctorError::ValidationError(format!("Unknown weekday: {}", day)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            changes.insert("available_days".to_string(), json!(days));
        }
        if let Some(fee) = self.consultation_fee {
            if !fee.is_finite() || fee < 0.0 {
                return Err(DoctorError::ValidationError("Consultation fee must be zero or more".to_string()));
            }
            changes.insert("consultation_fee".to_string(), json!(fee));
        }

        if changes.is_empty() {
            return Err(DoctorError::ValidationError("No doctor fields to update".to_string()));
        }

        Ok(changes)
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Appointment columns the dashboard aggregates over.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentStatRow {
    pub status: String,
    pub appointment_date: NaiveDate,
    #[serde(default)]
    pub fee: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorStats {
    pub total_appointments: i64,
    pub pending_appointments: i64,
    pub confirmed_appointments: i64,
    pub completed_appointments: i64,
    pub cancelled_appointments: i64,
    pub today_appointments: i64,
    pub total_earnings: f64,
    pub total_consultations: i32,
}

impl DoctorStats {
    /// Folds appointment rows into dashboard counters. `accepted` and
    /// `payment_pending` count as their canonical states.
    pub fn from_rows(rows: &[AppointmentStatRow], today: NaiveDate, total_consultations: i32) -> Self {
        let mut stats = DoctorStats {
            total_consultations,
            ..Default::default()
        };

        for row in rows {
            stats.total_appointments += 1;
            match row.status.as_str() {
                "pending" | "payment_pending" => stats.pending_appointments += 1,
                "confirmed" | "accepted" => stats.confirmed_appointments += 1,
                "completed" => {
                    stats.completed_appointments += 1;
                    stats.total_earnings += row.fee.unwrap_or(0.0);
                }
                "cancelled" => stats.cancelled_appointments += 1,
                _ => {}
            }
            if row.appointment_date == today {
                stats.today_appointments += 1;
            }
        }

        stats
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        DoctorError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, date: &str, fee: f64) -> AppointmentStatRow {
        AppointmentStatRow {
            status: status.to_string(),
            appointment_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            fee: Some(fee),
        }
    }

    #[test]
    fn doctor_update_normalizes_weekdays() {
        let request = UpdateDoctorRequest {
            available_days: Some(vec!["Sun".to_string(), "MONDAY".to_string()]),
            consultation_fee: Some(250.0),
            ..Default::default()
        };
        let changes = request.into_changes().unwrap();

        assert_eq!(changes["available_days"], json!(["sunday", "monday"]));
        assert_eq!(changes["consultation_fee"], json!(250.0));
    }

    #[test]
    fn doctor_update_rejects_bad_values() {
        let inverted = UpdateDoctorRequest {
            available_time_start: NaiveTime::from_hms_opt(17, 0, 0),
            available_time_end: NaiveTime::from_hms_opt(9, 0, 0),
            ..Default::default()
        };
        assert!(matches!(inverted.into_changes(), Err(DoctorError::ValidationError(_))));

        let unknown_day = UpdateDoctorRequest {
            available_days: Some(vec!["someday".to_string()]),
            ..Default::default()
        };
        assert!(matches!(unknown_day.into_changes(), Err(DoctorError::ValidationError(_))));

        let negative_fee = UpdateDoctorRequest {
            consultation_fee: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(negative_fee.into_changes(), Err(DoctorError::ValidationError(_))));

        assert!(matches!(
            UpdateDoctorRequest::default().into_changes(),
            Err(DoctorError::ValidationError(_))
        ));
    }

    #[test]
    fn stats_fold_counts_and_earnings() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let rows = vec![
            row("pending", "2025-01-10", 0.0),
            row("accepted", "2025-01-11", 0.0),
            row("completed", "2025-01-09", 300.0),
            row("completed", "2025-01-10", 250.0),
            row("cancelled", "2025-01-08", 100.0),
        ];

        let stats = DoctorStats::from_rows(&rows, today, 7);

        assert_eq!(stats.total_appointments, 5);
        assert_eq!(stats.pending_appointments, 1);
        assert_eq!(stats.confirmed_appointments, 1);
        assert_eq!(stats.completed_appointments, 2);
        assert_eq!(stats.cancelled_appointments, 1);
        assert_eq!(stats.today_appointments, 2);
        assert_eq!(stats.total_earnings, 550.0);
        assert_eq!(stats.total_consultations, 7);
    }

    #[test]
    fn specialization_parses_known_values_only() {
        assert_eq!("soil_fertility".parse::<Specialization>().unwrap(), Specialization::SoilFertility);
        assert!("cardiology".parse::<Specialization>().is_err());
    }
}
