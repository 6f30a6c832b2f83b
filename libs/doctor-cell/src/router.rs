use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Directory is readable without a token
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor));

    let protected_routes = Router::new()
        .route("/me/stats", get(handlers::get_my_stats))
        .route("/{doctor_id}", put(handlers::update_doctor).delete(handlers::delete_doctor))
        .route("/{doctor_id}/verify", patch(handlers::verify_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
