//! HTTP API route definitions.

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{create_case, health, list_cases, root, update_case, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Case endpoints
        .route("/cases", get(list_cases).post(create_case))
        .route("/cases/:id", put(update_case))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
