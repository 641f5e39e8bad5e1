use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub host: String,
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gcs_bucket_name: String,
    pub gcs_access_token: String,
    pub archive_uploads: bool,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("GEMINI_API_KEY is required"));
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            host: env_string("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8080),
            gemini_api_key,
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            gcs_bucket_name: env_string("GCS_BUCKET_NAME", "emotion-chatbot-assets"),
            gcs_access_token: env_string("GCS_ACCESS_TOKEN", ""),
            archive_uploads: env_bool("ARCHIVE_UPLOADS", false),
        })
    }
}

/// Label set the text prompt asks the model to pick from. The model is free
/// to answer outside this set; nothing downstream validates against it.
pub const EMOTION_LABELS: [&str; 10] = [
    "joy",
    "sadness",
    "anger",
    "fear",
    "surprise",
    "disgust",
    "neutral",
    "love",
    "excitement",
    "anxiety",
];

pub const TEXT_ANALYSIS_PROMPT: &str = r#"Analyze the emotional content of the following text.
Identify the primary emotion and provide:
1. Primary emotion (from: {emotions})
2. Confidence score (0-100)
3. Secondary emotions if present
4. Emotional intensity (low, medium, high)
5. Brief explanation

Text: "{text}"

Respond in JSON format."#;

pub const IMAGE_ANALYSIS_PROMPT: &str = r#"Analyze the emotional content in this image. Look for:
1. Facial expressions
2. Body language
3. Environmental context

Provide:
1. Primary emotion detected
2. Confidence score (0-100)
3. Additional emotions if present
4. Visual cues that led to this analysis
5. Emotional intensity

Respond in JSON format."#;

pub const MULTIMODAL_ANALYSIS_PROMPT: &str = r#"Analyze the emotional content from both the text and the image provided.
Consider how the text and visual information complement or contrast each other.

Text: "{text}"

Provide:
1. Overall primary emotion
2. Confidence score (0-100)
3. Text-based emotion
4. Image-based emotion
5. Consistency analysis (aligned/misaligned)
6. Combined emotional interpretation
7. Intensity assessment

Respond in JSON format."#;
