use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use crate::config::{
    EMOTION_LABELS, IMAGE_ANALYSIS_PROMPT, MULTIMODAL_ANALYSIS_PROMPT, TEXT_ANALYSIS_PROMPT,
};
use crate::llm::media::detect_mime_type;
use crate::llm::{GenerativeModel, ImagePart};

/// Rejected before any upstream call; surfaced to API callers as a 400.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Text is required")]
    MissingText,
    #[error("Image data or URI is required")]
    MissingImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Image,
    Multimodal,
}

impl InputType {
    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Image => "image",
            InputType::Multimodal => "multimodal",
        }
    }
}

/// Image payload as accepted by the API: base64 bytes inline, or a storage
/// URI the model provider resolves itself.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Inline(String),
    Uri(String),
}

impl ImageSource {
    /// A URI wins when both forms are supplied.
    pub fn from_parts(
        image: Option<String>,
        image_uri: Option<String>,
    ) -> Result<Self, InputError> {
        if let Some(uri) = image_uri.filter(|value| !value.trim().is_empty()) {
            return Ok(ImageSource::Uri(uri));
        }
        if let Some(data) = image.filter(|value| !value.trim().is_empty()) {
            return Ok(ImageSource::Inline(data));
        }
        Err(InputError::MissingImage)
    }
}

/// Flat response record: typed handler metadata layered over whatever keys
/// the model chose to emit. No schema is enforced on the open part.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Pulls a JSON object out of model output. Prefers a ```json fence, then
/// any fence, then the whole reply; an unclosed fence runs to end of input.
/// Anything that does not parse to an object yields the fallback record.
pub fn extract_emotion_fields(raw_text: &str) -> Map<String, Value> {
    let candidate = if let Some(start) = raw_text.find("```json") {
        let rest = &raw_text[start + "```json".len()..];
        match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        }
    } else if let Some(start) = raw_text.find("```") {
        let rest = &raw_text[start + 3..];
        match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        }
    } else {
        raw_text
    };

    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            debug!("Model reply was not a JSON object; returning raw fallback");
            fallback_fields(raw_text)
        }
    }
}

fn fallback_fields(raw_text: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("primary_emotion".to_string(), json!("unknown"));
    fields.insert("confidence".to_string(), json!(0));
    fields.insert("explanation".to_string(), json!(raw_text));
    fields.insert("raw_response".to_string(), json!(raw_text));
    fields
}

fn error_fields(message: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("error".to_string(), json!(true));
    fields.insert("message".to_string(), json!(message));
    fields.insert("primary_emotion".to_string(), json!("error"));
    fields.insert("confidence".to_string(), json!(0));
    fields
}

fn error_result(message: &str) -> AnalysisResult {
    AnalysisResult {
        input_type: None,
        timestamp: Utc::now(),
        fields: error_fields(message),
    }
}

/// The three analysis handlers. Each builds a mode prompt, makes exactly one
/// upstream call, reshapes the reply, and stamps handler metadata.
pub struct EmotionDecoder {
    model: Arc<dyn GenerativeModel>,
}

impl EmotionDecoder {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        EmotionDecoder { model }
    }

    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisResult, InputError> {
        if text.trim().is_empty() {
            return Err(InputError::MissingText);
        }

        let prompt = TEXT_ANALYSIS_PROMPT
            .replace("{emotions}", &EMOTION_LABELS.join(", "))
            .replace("{text}", text);
        Ok(self.run(InputType::Text, &prompt, None).await)
    }

    pub async fn analyze_image(&self, image: ImageSource) -> AnalysisResult {
        let part = match prepare_image_part(image) {
            Ok(part) => part,
            Err(err) => {
                error!("Error analyzing image emotion: {err:#}");
                return error_result(&err.to_string());
            }
        };
        self.run(InputType::Image, IMAGE_ANALYSIS_PROMPT, Some(part))
            .await
    }

    pub async fn analyze_multimodal(
        &self,
        text: &str,
        image: ImageSource,
    ) -> Result<AnalysisResult, InputError> {
        if text.trim().is_empty() {
            return Err(InputError::MissingText);
        }

        let part = match prepare_image_part(image) {
            Ok(part) => part,
            Err(err) => {
                error!("Error analyzing multimodal emotion: {err:#}");
                return Ok(error_result(&err.to_string()));
            }
        };
        let prompt = MULTIMODAL_ANALYSIS_PROMPT.replace("{text}", text);
        Ok(self.run(InputType::Multimodal, &prompt, Some(part)).await)
    }

    async fn run(
        &self,
        input_type: InputType,
        prompt: &str,
        image: Option<ImagePart>,
    ) -> AnalysisResult {
        match self.model.generate(prompt, image.as_ref()).await {
            Ok(raw_text) => {
                let mut fields = extract_emotion_fields(&raw_text);
                // Handler metadata wins over model-emitted keys.
                fields.remove("input_type");
                fields.remove("timestamp");

                let primary = fields
                    .get("primary_emotion")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                info!("{} emotion analyzed: {}", input_type.as_str(), primary);

                AnalysisResult {
                    input_type: Some(input_type),
                    timestamp: Utc::now(),
                    fields,
                }
            }
            Err(err) => {
                error!(
                    "Error analyzing {} emotion: {err:#}",
                    input_type.as_str()
                );
                error_result(&err.to_string())
            }
        }
    }
}

fn prepare_image_part(image: ImageSource) -> anyhow::Result<ImagePart> {
    match image {
        ImageSource::Uri(uri) => Ok(ImagePart::Uri {
            uri,
            mime_type: "image/jpeg".to_string(),
        }),
        ImageSource::Inline(data) => {
            let bytes = general_purpose::STANDARD.decode(data.trim())?;
            let mime_type =
                detect_mime_type(&bytes).unwrap_or_else(|| "image/jpeg".to_string());
            Ok(ImagePart::Inline { bytes, mime_type })
        }
    }
}
