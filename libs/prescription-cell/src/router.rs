use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn prescription_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_prescription))
        .route("/standalone", post(handlers::create_standalone_prescription))
        .route("/farmer", get(handlers::list_farmer_prescriptions))
        .route("/doctor", get(handlers::list_doctor_prescriptions))
        .route("/{reference}", get(handlers::get_prescription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
