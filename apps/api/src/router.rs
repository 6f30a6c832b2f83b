use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use appointment_cell::appointment_routes;
use doctor_cell::doctor_routes;
use farmer_cell::farmer_routes;
use notification_cell::notification_routes;
use order_cell::order_routes;
use prescription_cell::prescription_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let api = Router::new()
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/farmers", farmer_routes(state.clone()))
        .nest("/orders", order_routes(state.clone()));

    Router::new()
        .route("/", get(|| async { "Agri Consult API is running!" }))
        .route("/health", get(health))
        .with_state(state)
        .nest("/api", api)
}

async fn health(State(config): State<Arc<AppConfig>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "configured": config.is_configured()
    }))
}
