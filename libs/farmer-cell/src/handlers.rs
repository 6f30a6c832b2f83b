use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::{require_any_role, require_role};

use crate::models::{FarmerError, FarmerListQuery, UpdateFarmerProfileRequest};
use crate::services::FarmerService;

impl From<FarmerError> for AppError {
    fn from(err: FarmerError) -> Self {
        match err {
            FarmerError::NotFound => AppError::NotFound("Farmer profile not found".to_string()),
            FarmerError::ValidationError(msg) => AppError::ValidationError(msg),
            FarmerError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn get_farmer_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Farmer)?;

    let service = FarmerService::new(&config);
    let farmer = service.find_by_user_id(&user.id, auth.token())
        .await?
        .ok_or(FarmerError::NotFound)?;

    Ok(Json(json!(farmer)))
}

#[axum::debug_handler]
pub async fn update_farmer_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateFarmerProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Farmer)?;

    let service = FarmerService::new(&config);
    let farmer = service.update_profile(&user.id, request, auth.token()).await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "farmer": farmer
    })))
}

#[axum::debug_handler]
pub async fn list_farmers(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<FarmerListQuery>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[UserRole::Doctor, UserRole::Admin])?;

    let service = FarmerService::new(&config);
    let farmers = service.list_farmers(query, auth.token()).await?;

    Ok(Json(json!({
        "farmers": farmers,
        "total": farmers.len()
    })))
}

#[axum::debug_handler]
pub async fn get_farmer(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(farmer_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[UserRole::Doctor, UserRole::Admin])?;

    let service = FarmerService::new(&config);
    let farmer = service.get_farmer(&farmer_id, auth.token()).await?;

    Ok(Json(json!(farmer)))
}

#[axum::debug_handler]
pub async fn admin_update_farmer(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(farmer_id): Path<Uuid>,
    Json(request): Json<UpdateFarmerProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let service = FarmerService::new(&config);
    let farmer = service.admin_update(&farmer_id, request, auth.token()).await?;

    Ok(Json(json!({
        "message": "Farmer updated successfully",
        "farmer": farmer
    })))
}

#[axum::debug_handler]
pub async fn delete_farmer(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(farmer_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let service = FarmerService::new(&config);
    let farmer = service.delete_farmer(&farmer_id, auth.token()).await?;

    Ok(Json(json!({
        "message": "Farmer deleted successfully",
        "farmer_id": farmer.id
    })))
}
