use std::time::Duration;

use crate::error::AppError;

/// Default image-capable Gemini model.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the Gemini generation service.
/// Loaded from the environment (a `.env` file is honored via dotenvy).
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Load config from env vars. `GEMINI_API_KEY` is required; the rest
    /// have sensible defaults (`GEMINI_IMAGE_MODEL`, `GEMINI_BASE_URL`,
    /// `GEMINI_TIMEOUT_SECS` override them).
    pub fn from_env() -> Result<Self, AppError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let model = std::env::var("GEMINI_IMAGE_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        let base_url = std::env::var("GEMINI_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            api_key,
            model,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
