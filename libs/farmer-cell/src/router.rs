use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn farmer_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_farmers))
        .route("/profile", get(get_farmer_profile).put(update_farmer_profile))
        .route("/{id}", get(get_farmer).put(admin_update_farmer).delete(delete_farmer))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
