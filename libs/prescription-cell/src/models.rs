use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

// ==============================================================================
// PRESCRIPTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Medicine,
    Vaccine,
}

/// One prescribed line. Order within a prescription is the prescribing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineItem {
    pub name: String,
    pub dosage: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub prescription_no: String,
    pub appointment_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub farmer_id: Option<Uuid>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    #[serde(default)]
    pub medicines: Vec<MedicineItem>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MedicineItemInput {
    pub name: String,
    pub dosage: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

/// Prescription tied to one of the doctor's appointments; the farmer comes
/// from the appointment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub appointment_id: Uuid,
    pub diagnosis: String,
    pub treatment: Option<String>,
    #[serde(default)]
    pub medicines: Vec<MedicineItemInput>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandalonePrescriptionRequest {
    pub farmer_id: Uuid,
    pub diagnosis: String,
    pub treatment: Option<String>,
    #[serde(default)]
    pub medicines: Vec<MedicineItemInput>,
    #[serde(default)]
    pub vaccines: Vec<MedicineItemInput>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Validated, store-ready content shared by both issuance paths.
#[derive(Debug, Clone)]
pub struct PrescriptionDraft {
    pub appointment_id: Option<Uuid>,
    pub farmer_id: Uuid,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub items: Vec<MedicineItem>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl PrescriptionDraft {
    pub fn linked(request: CreatePrescriptionRequest, farmer_id: Uuid) -> Result<Self, PrescriptionError> {
        Self::build(
            Some(request.appointment_id),
            farmer_id,
            request.diagnosis,
            request.treatment,
            tag_items(request.medicines, ItemKind::Medicine),
            request.instructions,
            request.follow_up_date,
            request.notes,
        )
    }

    /// Medicines first, then vaccines.
    pub fn standalone(request: StandalonePrescriptionRequest) -> Result<Self, PrescriptionError> {
        let mut items = tag_items(request.medicines, ItemKind::Medicine);
        items.extend(tag_items(request.vaccines, ItemKind::Vaccine));

        Self::build(
            None,
            request.farmer_id,
            request.diagnosis,
            request.treatment,
            items,
            request.instructions,
            request.follow_up_date,
            request.notes,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        appointment_id: Option<Uuid>,
        farmer_id: Uuid,
        diagnosis: String,
        treatment: Option<String>,
        items: Vec<MedicineItem>,
        instructions: Option<String>,
        follow_up_date: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<Self, PrescriptionError> {
        let diagnosis = diagnosis.trim().to_string();
        if diagnosis.is_empty() {
            return Err(PrescriptionError::ValidationError("Diagnosis is required".to_string()));
        }
        if items.iter().any(|item| item.name.is_empty()) {
            return Err(PrescriptionError::ValidationError("Every medicine needs a name".to_string()));
        }

        Ok(Self {
            appointment_id,
            farmer_id,
            diagnosis,
            treatment: trimmed(treatment),
            items,
            instructions: trimmed(instructions),
            follow_up_date,
            notes: trimmed(notes),
        })
    }
}

fn tag_items(inputs: Vec<MedicineItemInput>, kind: ItemKind) -> Vec<MedicineItem> {
    inputs
        .into_iter()
        .map(|input| MedicineItem {
            name: input.name.trim().to_string(),
            dosage: trimmed(input.dosage),
            duration: trimmed(input.duration),
            instructions: trimmed(input.instructions),
            kind,
        })
        .collect()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Farmer not found")]
    FarmerNotFound,

    #[error("Doctor profile not found")]
    DoctorProfileNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Could not allocate a unique prescription number")]
    NumberExhausted,

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for PrescriptionError {
    fn from(err: anyhow::Error) -> Self {
        PrescriptionError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for PrescriptionError {
    fn from(err: serde_json::Error) -> Self {
        PrescriptionError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> MedicineItemInput {
        MedicineItemInput {
            name: name.to_string(),
            dosage: Some("2 g/L".to_string()),
            duration: None,
            instructions: Some("  ".to_string()),
        }
    }

    #[test]
    fn standalone_lists_vaccines_after_medicines() {
        let draft = PrescriptionDraft::standalone(StandalonePrescriptionRequest {
            farmer_id: Uuid::new_v4(),
            diagnosis: " Newcastle disease risk ".to_string(),
            treatment: None,
            medicines: vec![item("Vitamin premix"), item("Electrolytes")],
            vaccines: vec![item("Lasota")],
            instructions: None,
            follow_up_date: None,
            notes: None,
        })
        .unwrap();

        let names: Vec<&str> = draft.items.iter().map(|i| i.name.as_str()).collect();
        let kinds: Vec<ItemKind> = draft.items.iter().map(|i| i.kind).collect();

        assert_eq!(names, vec!["Vitamin premix", "Electrolytes", "Lasota"]);
        assert_eq!(kinds, vec![ItemKind::Medicine, ItemKind::Medicine, ItemKind::Vaccine]);
        assert_eq!(draft.diagnosis, "Newcastle disease risk");
        assert_eq!(draft.items[0].instructions, None);
    }

    #[test]
    fn blank_diagnosis_or_item_name_is_rejected() {
        let request = CreatePrescriptionRequest {
            appointment_id: Uuid::new_v4(),
            diagnosis: "   ".to_string(),
            treatment: None,
            medicines: vec![],
            instructions: None,
            follow_up_date: None,
            notes: None,
        };
        assert!(matches!(
            PrescriptionDraft::linked(request.clone(), Uuid::new_v4()),
            Err(PrescriptionError::ValidationError(_))
        ));

        let unnamed = CreatePrescriptionRequest {
            diagnosis: "Blast".to_string(),
            medicines: vec![item(" ")],
            ..request
        };
        assert!(matches!(
            PrescriptionDraft::linked(unnamed, Uuid::new_v4()),
            Err(PrescriptionError::ValidationError(_))
        ));
    }

    #[test]
    fn legacy_type_field_reads_as_kind() {
        let item: MedicineItem = serde_json::from_value(serde_json::json!({
            "name": "FMD vaccine",
            "dosage": null,
            "duration": null,
            "instructions": null,
            "type": "vaccine"
        }))
        .unwrap();

        assert_eq!(item.kind, ItemKind::Vaccine);
    }
}
