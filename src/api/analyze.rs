use axum::extract::State;
use axum::Json;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::decoder::{AnalysisResult, ImageSource, InputError};
use crate::llm::media::detect_mime_type;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image: Option<String>,
    pub image_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultimodalRequest {
    #[serde(default)]
    pub text: String,
    pub image: Option<String>,
    pub image_uri: Option<String>,
}

/// POST /api/analyze/text
pub async fn analyze_text(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let result = state.decoder.analyze_text(&request.text).await?;
    Ok(Json(result))
}

/// POST /api/analyze/image
pub async fn analyze_image(
    State(state): State<AppState>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let source = ImageSource::from_parts(request.image, request.image_uri)?;
    maybe_archive(&state, &source);
    Ok(Json(state.decoder.analyze_image(source).await))
}

/// POST /api/analyze/multimodal
pub async fn analyze_multimodal(
    State(state): State<AppState>,
    Json(request): Json<MultimodalRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    // Text is checked first so a request missing both inputs reports the
    // text error, matching the published API behavior.
    if request.text.trim().is_empty() {
        return Err(InputError::MissingText.into());
    }
    let source = ImageSource::from_parts(request.image, request.image_uri)?;
    maybe_archive(&state, &source);
    let result = state.decoder.analyze_multimodal(&request.text, source).await?;
    Ok(Json(result))
}

/// Fire-and-forget archival of inline uploads. Never blocks or fails the
/// analysis request.
fn maybe_archive(state: &AppState, source: &ImageSource) {
    if !state.storage.archive_enabled() {
        return;
    }
    let ImageSource::Inline(data) = source else {
        return;
    };
    let Ok(bytes) = general_purpose::STANDARD.decode(data.trim()) else {
        return;
    };

    let storage = state.storage.clone();
    tokio::spawn(async move {
        let mime_type = detect_mime_type(&bytes).unwrap_or_else(|| "image/jpeg".to_string());
        match storage.archive_image(&bytes, &mime_type).await {
            Ok(uri) => debug!("Archived upload to {uri}"),
            Err(err) => warn!("Failed to archive upload: {err:#}"),
        }
    });
}
