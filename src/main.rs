use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;

use emotion_decoder::config::CONFIG;
use emotion_decoder::decoder::EmotionDecoder;
use emotion_decoder::llm::GeminiClient;
use emotion_decoder::storage::StorageClient;
use emotion_decoder::utils::logging::init_logging;
use emotion_decoder::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guards = init_logging();

    info!(
        "Starting emotion-decoder v{} (model: {})",
        env!("CARGO_PKG_VERSION"),
        CONFIG.gemini_model
    );

    let model = Arc::new(GeminiClient::from_config(&CONFIG));
    let storage = Arc::new(StorageClient::from_config(&CONFIG));
    if storage.archive_enabled() {
        info!("Upload archiving enabled (bucket: {})", CONFIG.gcs_bucket_name);
    }

    let decoder = Arc::new(EmotionDecoder::new(model));
    let state = AppState::new(decoder, storage);
    let app = build_router(state);

    let addr = format!("{}:{}", CONFIG.host, CONFIG.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("emotion-decoder listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}
