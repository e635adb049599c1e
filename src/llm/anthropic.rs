use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::{Result, WrittenError};
use crate::llm::{Completion, Provider, TextBackend};

const API_VERSION: &str = "2023-06-01";

/// Backend for the Anthropic messages API.
pub(super) struct AnthropicEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_activity_tokens: u32,
}

// -- messages API request/response types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl AnthropicEngine {
    pub(super) fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WrittenError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            model = %config.anthropic_model,
            base_url = %config.anthropic_base_url,
            "Anthropic engine initialized"
        );

        Ok(Self {
            client,
            api_key: config.resolved_anthropic_api_key(),
            base_url: config.anthropic_base_url.clone(),
            model: config.anthropic_model.clone(),
            max_activity_tokens: config.max_activity_tokens,
        })
    }

    fn resolve_model(&self, model: Option<&str>) -> String {
        model
            .filter(|m| m.starts_with("claude"))
            .map(str::to_string)
            .unwrap_or_else(|| self.model.clone())
    }

    async fn messages(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<Completion> {
        let url = format!("{}/messages", self.base_url);

        let body = MessagesRequest {
            model: model.to_string(),
            max_tokens,
            temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(
            model = %model,
            prompt_len = prompt.len(),
            max_tokens,
            "invoking Anthropic API"
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| WrittenError::Llm(format!("Anthropic request failed: {e}")))?;

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
            warn!(status = %status, error = %error_msg, "Anthropic API error");
            return Err(WrittenError::Llm(format!(
                "Anthropic API returned {status}: {error_msg}"
            )));
        }

        let msg_resp: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| WrittenError::Llm(format!("failed to parse Anthropic response: {e}")))?;

        let total_tokens = msg_resp
            .usage
            .as_ref()
            .map(|u| u.input_tokens + u.output_tokens);
        let text = msg_resp
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .unwrap_or_default()
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(WrittenError::Llm("Anthropic returned empty response".into()));
        }

        Ok(Completion {
            text,
            model: model.to_string(),
            total_tokens,
        })
    }
}

#[async_trait::async_trait]
impl TextBackend for AnthropicEngine {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<Completion> {
        let model = self.resolve_model(model);
        self.messages(prompt, &model, self.max_activity_tokens, None)
            .await
    }

    async fn generate_structured(&self, prompt: &str, model: Option<&str>) -> Result<Completion> {
        let model = self.resolve_model(model);
        // Lower temperature keeps the JSON output stable
        self.messages(prompt, &model, 1500, Some(0.3)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_override_must_be_claude() {
        let engine = AnthropicEngine::new(&AiConfig::default()).unwrap();
        assert_eq!(engine.resolve_model(None), "claude-3-sonnet-20240229");
        assert_eq!(
            engine.resolve_model(Some("claude-3-opus-20240229")),
            "claude-3-opus-20240229"
        );
        assert_eq!(engine.resolve_model(Some("gemini-2.5-pro")), "claude-3-sonnet-20240229");
    }
}
