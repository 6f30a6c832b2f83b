use std::sync::Arc;
use axum::{
    extract::{State, Extension},
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

use crate::models::{CreateOrderRequest, OrderError};
use crate::services::OrderService;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::FarmerNotFound => AppError::NotFound("Farmer profile not found".to_string()),
            OrderError::ValidationError(msg) => AppError::ValidationError(msg),
            OrderError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn create_order(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, UserRole::Farmer)?;

    let service = OrderService::new(&config);
    let farmer = service.resolve_farmer(&user.id, auth.token()).await?;
    let order = service.create_order(&farmer, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "id": order.id,
        "total_amount": order.total_amount,
        "order": order
    }))))
}

#[axum::debug_handler]
pub async fn list_farmer_orders(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Farmer)?;

    let service = OrderService::new(&config);
    let farmer = service.resolve_farmer(&user.id, auth.token()).await?;
    let orders = service.list_for_farmer(&farmer, auth.token()).await?;

    Ok(Json(json!(orders)))
}
