use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const GEMINI_REQUEST_TIMEOUT_SECS: u64 = 90;

/// One image attachment for a generate call. `Inline` bytes are base64
/// encoded into the request body; `Uri` references are resolved by the
/// provider and never fetched locally.
#[derive(Debug, Clone)]
pub enum ImagePart {
    Inline { bytes: Vec<u8>, mime_type: String },
    Uri { uri: String, mime_type: String },
}

/// Upstream multimodal model seam. Handlers hold this as a trait object so
/// tests can substitute a fake that never leaves the process.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str, image: Option<&ImagePart>) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            for part in content.parts.unwrap_or_default() {
                if let Some(text) = part.text {
                    if !text.trim().is_empty() {
                        text_parts.push(text);
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

impl GeminiClient {
    pub fn from_config(config: &Config) -> Self {
        GeminiClient {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            temperature: config.gemini_temperature,
            top_k: config.gemini_top_k,
            top_p: config.gemini_top_p,
            max_output_tokens: config.gemini_max_output_tokens,
        }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn build_payload(&self, prompt: &str, image: Option<&ImagePart>) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        match image {
            Some(ImagePart::Inline { bytes, mime_type }) => {
                parts.push(json!({
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": general_purpose::STANDARD.encode(bytes)
                    }
                }));
            }
            Some(ImagePart::Uri { uri, mime_type }) => {
                parts.push(json!({
                    "fileData": {
                        "fileUri": uri,
                        "mimeType": mime_type
                    }
                }));
            }
            None => {}
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "topK": self.top_k,
                "topP": self.top_p,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }

    async fn call_api(&self, payload: Value) -> Result<GeminiResponse> {
        let client = get_http_client();
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = client
            .post(&url)
            .timeout(Duration::from_secs(GEMINI_REQUEST_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                anyhow!(
                    "Gemini request failed: {} (timeout={}, connect={})",
                    self.redact_api_key(&err.to_string()),
                    err.is_timeout(),
                    err.is_connect()
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                self.redact_api_key(&detail)
            ));
        }

        Ok(response.json::<GeminiResponse>().await?)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str, image: Option<&ImagePart>) -> Result<String> {
        let payload = self.build_payload(prompt, image);
        debug!(
            target: "llm.gemini",
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            has_image = image.is_some(),
        );

        log_llm_timing("gemini", &self.model, "generate_content", None, || async {
            let response = self.call_api(payload).await?;
            Ok(extract_text_from_response(response))
        })
        .await
    }
}
