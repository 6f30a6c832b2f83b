use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn order_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(create_order))
        .route("/farmer", get(list_farmer_orders))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
