use serde::Serialize;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes cleanly for Tauri IPC so the frontend gets structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The source image could not be decoded (bad data URL, bad base64).
    #[error("Failed to read the image: {0}")]
    Read(String),

    /// The external generation service failed or returned no image.
    /// Carries the service/model message verbatim so the user sees why.
    #[error("{0}")]
    Generation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

/// Tauri requires `Serialize` on command return errors.
/// We serialize as `{ error: "...", kind: "..." }` for frontend consumption.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field(
            "kind",
            match self {
                AppError::Read(_) => "read",
                AppError::Generation(_) => "generation",
                AppError::Validation(_) => "validation",
                AppError::Config(_) => "config",
                AppError::Io(_) => "io",
                AppError::Serde(_) => "serde",
                AppError::Internal(_) => "internal",
            },
        )?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind() {
        let err = AppError::Read("not a data URL".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "read");
        assert_eq!(json["error"], "Failed to read the image: not a data URL");
    }

    #[test]
    fn generation_error_displays_message_verbatim() {
        let err = AppError::Generation("quota exceeded".to_string());
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
