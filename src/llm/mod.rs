pub mod gemini;
pub mod media;

pub use gemini::{GeminiClient, GenerativeModel, ImagePart};
