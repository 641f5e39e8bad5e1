use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod decoder;
pub mod llm;
pub mod storage;
pub mod utils;

use decoder::EmotionDecoder;
use storage::StorageClient;

/// Shared across HTTP handlers; the clients inside live for the process.
#[derive(Clone)]
pub struct AppState {
    pub decoder: Arc<EmotionDecoder>,
    pub storage: Arc<StorageClient>,
}

impl AppState {
    pub fn new(decoder: Arc<EmotionDecoder>, storage: Arc<StorageClient>) -> Self {
        AppState { decoder, storage }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze/text", post(api::analyze_text))
        .route("/api/analyze/image", post(api::analyze_image))
        .route("/api/analyze/multimodal", post(api::analyze_multimodal))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
