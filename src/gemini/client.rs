use async_trait::async_trait;

use crate::config::GeminiConfig;
use crate::error::AppError;
use crate::session::EncodedImage;

use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};

/// Fixed instruction for the first-pass refinement of a raw sketch.
const REFINE_PROMPT: &str = "Clean up this hand-drawn diagram. Make the lines crisp and clear, \
    remove any smudges or unnecessary marks, and present it as a neat, professional-looking \
    digital drawing. Do not add any new elements or labels unless they are part of the original \
    drawing. The primary output should be the refined image.";

/// Convert any displayable error into `AppError::Generation`.
fn gen_err(e: impl std::fmt::Display) -> AppError {
    AppError::Generation(e.to_string())
}

/// The seam between the session commands and the external generation
/// service. Both operations are single-shot: retry, if any, is the user
/// resubmitting.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// First-pass transformation of a raw sketch into a clean diagram.
    async fn refine(&self, image: &EncodedImage) -> Result<EncodedImage, AppError>;

    /// Instruction-driven transformation of the current diagram.
    async fn edit(&self, image: &EncodedImage, instruction: &str)
        -> Result<EncodedImage, AppError>;
}

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    /// Send one image + instruction request asking for both image and text
    /// output, and return the first image in the response. If the model
    /// returned only text (a refusal or explanation), surface that text
    /// verbatim so the user sees why no image was produced.
    async fn generate(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage, AppError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::image(image), Part::text(instruction)],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(gen_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "generation service returned {}: {}",
                status,
                truncate(&body, 500)
            )));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(gen_err)?;
        let (image, commentary) = extract_content(&parsed);

        image.ok_or_else(|| AppError::Generation(no_image_message(commentary)))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn refine(&self, image: &EncodedImage) -> Result<EncodedImage, AppError> {
        tracing::info!(model = %self.config.model, "refining sketch");
        self.generate(image, REFINE_PROMPT).await
    }

    async fn edit(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage, AppError> {
        tracing::info!(model = %self.config.model, instruction = %truncate(instruction, 120), "editing diagram");
        self.generate(image, instruction).await
    }
}

/// Scan the response for the first inline image (any further images are
/// ignored) and collect all text parts as commentary.
fn extract_content(response: &GenerateContentResponse) -> (Option<EncodedImage>, Option<String>) {
    let mut image = None;
    let mut commentary = Vec::new();

    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            if let Some(text) = &part.text {
                if !text.is_empty() {
                    commentary.push(text.as_str());
                }
            }
            if image.is_none() {
                if let Some(inline) = &part.inline_data {
                    image = Some(EncodedImage::new(
                        inline.mime_type.clone(),
                        inline.data.clone(),
                    ));
                }
            }
        }
    }

    let commentary = if commentary.is_empty() {
        None
    } else {
        Some(commentary.join(" "))
    };
    (image, commentary)
}

fn no_image_message(commentary: Option<String>) -> String {
    match commentary {
        Some(text) => format!("The model responded: \"{text}\""),
        None => "No image was found in the model response.".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_offset, _)) => format!("{}...", &s[..byte_offset]),
        None => s.to_string(),
    }
}
