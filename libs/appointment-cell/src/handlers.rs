use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
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
use shared_utils::extractor::{require_any_role, require_role};
use doctor_cell::Doctor;
use farmer_cell::Farmer;

use crate::models::{
    AppointmentError, AppointmentListQuery, ConsultationNotesRequest, RequestAppointmentRequest,
    RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::booking::{AppointmentBookingService, Party};

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::FarmerNotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::DoctorProfileNotFound => AppError::NotFound(message),
            AppointmentError::InvalidStatus(_)
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::DuplicateBooking
            | AppointmentError::NotEditable(_) => AppError::BadRequest(message),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::ConcurrentModification => AppError::Conflict(message),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

async fn resolve_farmer(
    service: &AppointmentBookingService,
    user: &User,
    token: &str,
) -> Result<Farmer, AppError> {
    require_role(user, UserRole::Farmer)?;
    match service.resolve_party(user, token).await? {
        Party::Farmer(farmer) => Ok(farmer),
        _ => Err(AppError::Forbidden("Access denied. Only farmers can do this.".to_string())),
    }
}

async fn resolve_doctor(
    service: &AppointmentBookingService,
    user: &User,
    token: &str,
) -> Result<Doctor, AppError> {
    require_role(user, UserRole::Doctor)?;
    match service.resolve_party(user, token).await? {
        Party::Doctor(doctor) => Ok(doctor),
        _ => Err(AppError::Forbidden("Access denied. Only doctors can do this.".to_string())),
    }
}

#[axum::debug_handler]
pub async fn request_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RequestAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let farmer = resolve_farmer(&booking_service, &user, token).await?;
    let appointment = booking_service.request_appointment(&farmer, request, token).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "message": "Appointment request sent successfully",
        "appointment_id": appointment.id,
        "status": appointment.status,
        "appointment": appointment
    }))))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let party = booking_service.resolve_party(&user, token).await?;
    let page = booking_service.list_appointments(&party, query, Utc::now(), token).await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let party = booking_service.resolve_party(&user, token).await?;
    let appointment = booking_service.get_appointment(&party, &appointment_id, token).await?;

    Ok(Json(booking_service.view(appointment, Utc::now()).to_detail_json()))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[UserRole::Doctor, UserRole::Farmer])?;

    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let party = booking_service.resolve_party(&user, token).await?;
    let appointment = booking_service.transition_status(&party, &appointment_id, request, token).await?;

    Ok(Json(json!({
        "message": format!("Appointment {} successfully", appointment.status),
        "appointment_id": appointment.id,
        "status": appointment.status,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn add_consultation_notes(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<ConsultationNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let doctor = resolve_doctor(&booking_service, &user, token).await?;
    let appointment = booking_service.add_consultation_notes(&doctor, &appointment_id, request, token).await?;

    Ok(Json(json!({
        "message": "Consultation notes saved successfully",
        "appointment_id": appointment.id
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let farmer = resolve_farmer(&booking_service, &user, token).await?;
    let appointment = booking_service.reschedule_appointment(&farmer, &appointment_id, request, token).await?;

    Ok(Json(json!({
        "message": "Appointment rescheduled successfully",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[UserRole::Farmer, UserRole::Admin])?;

    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let party = booking_service.resolve_party(&user, token).await?;
    booking_service.delete_appointment(&party, &appointment_id, token).await?;

    Ok(Json(json!({
        "message": "Appointment deleted successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_readiness(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let party = booking_service.resolve_party(&user, token).await?;
    let report = booking_service.readiness(&party, &appointment_id, Utc::now(), token).await?;

    Ok(Json(json!(report)))
}
