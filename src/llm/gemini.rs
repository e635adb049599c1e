use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::{Result, WrittenError};
use crate::llm::{Completion, Provider, TextBackend};

/// Backend for the Google AI Studio `generateContent` REST API. The primary
/// provider: availability requires a key with the `AIza` prefix.
pub(super) struct GeminiEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

// -- generateContent request/response types ---

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiEngine {
    pub(super) fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WrittenError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            model = %config.gemini_model,
            base_url = %config.gemini_base_url,
            "Gemini engine initialized"
        );

        Ok(Self {
            client,
            api_key: config.resolved_gemini_api_key(),
            base_url: config.gemini_base_url.clone(),
            model: config.gemini_model.clone(),
        })
    }

    /// Honor a model override only when it names a Gemini model.
    fn resolve_model(&self, model: Option<&str>) -> String {
        model
            .filter(|m| m.starts_with("gemini"))
            .map(str::to_string)
            .unwrap_or_else(|| self.model.clone())
    }

    async fn generate_content(&self, prompt: &str, model: &str) -> Result<Completion> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!(model = %model, prompt_len = prompt.len(), "invoking Gemini API");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WrittenError::Llm(format!("Gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(err_resp) => err_resp
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| error_text.clone()),
                Err(_) => error_text,
            };
            warn!(status = %status, error = %error_msg, "Gemini API error");
            return Err(WrittenError::Llm(format!(
                "Gemini API returned {status}: {error_msg}"
            )));
        }

        let content_resp: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| WrittenError::Llm(format!("failed to parse Gemini response: {e}")))?;

        let text = content_resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default()
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(WrittenError::Llm("Gemini returned empty response".into()));
        }

        Ok(Completion {
            text,
            model: model.to_string(),
            // generateContent usage metadata is not tracked
            total_tokens: None,
        })
    }
}

#[async_trait::async_trait]
impl TextBackend for GeminiEngine {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<Completion> {
        let model = self.resolve_model(model);
        self.generate_content(prompt, &model).await
    }

    async fn generate_structured(&self, prompt: &str, model: Option<&str>) -> Result<Completion> {
        let model = self.resolve_model(model);
        let full_prompt = format!(
            "{prompt}\n\nPlease respond with valid JSON only, no additional text or markdown formatting."
        );
        self.generate_content(&full_prompt, &model).await
    }
}
