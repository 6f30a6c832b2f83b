use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{DoctorError, DoctorListQuery, Specialization, UpdateDoctorRequest};
use crate::services::DoctorService;

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let specialization = query
        .specialization
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<Specialization>)
        .transpose()?;

    let doctor_service = DoctorService::new(&state);
    let doctors = doctor_service
        .list_verified(specialization, query.limit, query.offset)
        .await
        .map_err(DoctorError::from)?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.get_doctor(&doctor_id, None).await
        .map_err(DoctorError::from)?
        .ok_or(DoctorError::NotFound)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn verify_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.verify_doctor(&doctor_id, auth.token()).await
        .map_err(DoctorError::from)?
        .ok_or(DoctorError::NotFound)?;

    Ok(Json(json!({
        "message": "Doctor verified successfully",
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let changes = request.into_changes()?;
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.update_doctor(&doctor_id, changes, auth.token()).await
        .map_err(DoctorError::from)?
        .ok_or(DoctorError::NotFound)?;

    Ok(Json(json!({
        "message": "Doctor updated successfully",
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.delete_doctor(&doctor_id, auth.token()).await
        .map_err(DoctorError::from)?
        .ok_or(DoctorError::NotFound)?;

    Ok(Json(json!({
        "message": "Doctor deleted successfully",
        "doctor_id": doctor.id
    })))
}

#[axum::debug_handler]
pub async fn get_my_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Doctor)?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.find_by_user_id(&user.id, auth.token()).await
        .map_err(DoctorError::from)?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;

    let stats = doctor_service
        .get_dashboard_stats(&doctor, Utc::now().date_naive(), auth.token())
        .await
        .map_err(DoctorError::from)?;

    Ok(Json(json!(stats)))
}
