use std::sync::Arc;

use axum::{routing::get, Router};

use associate_cell::router::associate_routes;
use availability_cell::router::availability_routes;
use booking_cell::router::booking_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Solace Clinic API is running!" }))
        .nest("/api/associates", associate_routes(state.clone()))
        .nest("/api/availability", availability_routes(state.clone()))
        .nest("/api/bookings", booking_routes(state))
}
