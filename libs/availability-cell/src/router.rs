use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // Reads and writes both require an authenticated principal; writes are
    // further restricted in the handlers (associate themself or admin).
    let protected_routes = Router::new()
        .route("/{associate_id}/days", post(handlers::set_availability))
        .route("/{associate_id}/pattern", post(handlers::apply_pattern))
        .route("/{associate_id}/clear", post(handlers::clear_availability))
        .route("/{associate_id}", get(handlers::get_availability))
        .route("/{associate_id}/next", get(handlers::next_free_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
