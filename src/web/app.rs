use super::{AppState, MAX_IMAGE_SIZE_BYTES, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

pub fn create_app(state: AppState, static_dir: &Path) -> Router {
    // Configure the router with all endpoints
    Router::new()
        // Upload page
        .route("/", get(handlers::home))
        .route("/process-image", post(handlers::process_image))
        // Page assets
        .nest_service("/static", ServeDir::new(static_dir))
        // Apply a layer to limit the maximum size of request bodies
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE_BYTES))
        // The upload page may be hosted elsewhere
        .layer(CorsLayer::permissive())
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        // Provide the shared state
        .with_state(state)
}
