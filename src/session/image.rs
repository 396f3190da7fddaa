use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::AppError;

/// A self-describing image payload: media type + base64-encoded bytes.
/// Immutable once produced. Travels to and from the webview as a `data:` URL,
/// which is also the shape the generation service's `inlineData` parts use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    data: String,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL. Both file uploads and
    /// canvas captures arrive in this form. Non-base64 data URLs are rejected.
    pub fn from_data_url(url: &str) -> Result<Self, AppError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| AppError::Read("not a data URL".to_string()))?;

        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| AppError::Read("malformed data URL".to_string()))?;

        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::Read("only base64 data URLs are supported".to_string()))?;

        if mime_type.is_empty() || data.is_empty() {
            return Err(AppError::Read("empty media type or payload".to_string()));
        }

        // Reject payloads that would fail to decode later
        BASE64
            .decode(data)
            .map_err(|e| AppError::Read(format!("invalid base64 payload: {e}")))?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decode the payload to raw bytes (used when saving to disk).
    pub fn decode(&self) -> Result<Vec<u8>, AppError> {
        BASE64
            .decode(&self.data)
            .map_err(|e| AppError::Read(format!("invalid base64 payload: {e}")))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.data
    }
}
