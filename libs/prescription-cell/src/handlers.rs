use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CreatePrescriptionRequest, Prescription, PrescriptionError, StandalonePrescriptionRequest,
};
use crate::services::{PrescriptionRef, PrescriptionService, Viewer};

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        let message = err.to_string();
        match err {
            PrescriptionError::NotFound
            | PrescriptionError::AppointmentNotFound
            | PrescriptionError::FarmerNotFound
            | PrescriptionError::DoctorProfileNotFound => AppError::NotFound(message),
            PrescriptionError::ValidationError(msg) => AppError::ValidationError(msg),
            PrescriptionError::Forbidden(msg) => AppError::Forbidden(msg),
            PrescriptionError::NumberExhausted => AppError::Conflict(message),
            PrescriptionError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn created(prescription: Prescription) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({
        "message": "Prescription created successfully",
        "prescription_id": prescription.id,
        "prescription_no": prescription.prescription_no,
        "prescription": prescription
    })))
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, UserRole::Doctor)?;

    let token = auth.token();
    let service = PrescriptionService::new(&state);

    let doctor = service.resolve_doctor(&user, token).await?;
    let prescription = service.create_for_appointment(&doctor, request, token).await?;

    Ok(created(prescription))
}

#[axum::debug_handler]
pub async fn create_standalone_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<StandalonePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, UserRole::Doctor)?;

    let token = auth.token();
    let service = PrescriptionService::new(&state);

    let doctor = service.resolve_doctor(&user, token).await?;
    let prescription = service.create_standalone(&doctor, request, token).await?;

    Ok(created(prescription))
}

#[axum::debug_handler]
pub async fn list_farmer_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Farmer)?;

    let token = auth.token();
    let service = PrescriptionService::new(&state);

    let Viewer::Farmer(farmer) = service.resolve_viewer(&user, token).await? else {
        return Err(AppError::Forbidden("Access denied. Only farmers can do this.".to_string()));
    };
    let prescriptions = service.list_for_farmer(&farmer, token).await?;

    Ok(Json(json!(prescriptions)))
}

#[axum::debug_handler]
pub async fn list_doctor_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Doctor)?;

    let token = auth.token();
    let service = PrescriptionService::new(&state);

    let doctor = service.resolve_doctor(&user, token).await?;
    let prescriptions = service.list_for_doctor(&doctor, token).await?;

    Ok(Json(json!(prescriptions)))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(reference): Path<String>,
) -> Result<Json<Value>, AppError> {
    let reference: PrescriptionRef = reference.parse()?;
    let token = auth.token();
    let service = PrescriptionService::new(&state);

    let viewer = service.resolve_viewer(&user, token).await?;
    let prescription = service.get(&viewer, &reference, token).await?;

    Ok(Json(json!(prescription)))
}
