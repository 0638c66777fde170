//! API layer -- axum routes, handlers, and middleware.

pub mod error;
mod routes;
pub mod state;
pub mod tools;

use self::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> error::ApiError {
    error::ApiError::NotFound("not found".to_string())
}
