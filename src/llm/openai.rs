use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::{Result, WrittenError};
use crate::llm::{Completion, Provider, TextBackend};

const ACTIVITY_SYSTEM_PROMPT: &str = "You are a helpful assistant that generates professional \
     daily activity descriptions for project management.";

const STRUCTURED_SYSTEM_PROMPT: &str = "You are a professional product manager and technical \
     writer. Always respond with valid JSON only.";

/// Backend for the OpenAI chat completions API.
pub(super) struct OpenAiEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    /// Token budget for plain activity generation. Structured requests use a
    /// fixed larger budget since backlog items run longer.
    max_activity_tokens: u32,
}

// -- chat completions request/response types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiEngine {
    pub(super) fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WrittenError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            model = %config.openai_model,
            base_url = %config.openai_base_url,
            "OpenAI engine initialized"
        );

        Ok(Self {
            client,
            api_key: config.resolved_openai_api_key(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
            max_activity_tokens: config.max_activity_tokens,
        })
    }

    fn resolve_model(&self, model: Option<&str>) -> String {
        model
            .filter(|m| m.starts_with("gpt"))
            .map(str::to_string)
            .unwrap_or_else(|| self.model.clone())
    }

    async fn chat(
        &self,
        system_prompt: &str,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
        };

        debug!(
            model = %model,
            prompt_len = prompt.len(),
            max_tokens,
            "invoking OpenAI API"
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| WrittenError::Llm(format!("OpenAI request failed: {e}")))?;

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
            warn!(status = %status, error = %error_msg, "OpenAI API error");
            return Err(WrittenError::Llm(format!(
                "OpenAI API returned {status}: {error_msg}"
            )));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| WrittenError::Llm(format!("failed to parse OpenAI response: {e}")))?;

        let total_tokens = chat_resp.usage.as_ref().map(|u| u.total_tokens);
        let text = chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(WrittenError::Llm("OpenAI returned empty response".into()));
        }

        Ok(Completion {
            text,
            model: model.to_string(),
            total_tokens,
        })
    }
}

#[async_trait::async_trait]
impl TextBackend for OpenAiEngine {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<Completion> {
        let model = self.resolve_model(model);
        self.chat(
            ACTIVITY_SYSTEM_PROMPT,
            prompt,
            &model,
            self.max_activity_tokens,
            0.7,
        )
        .await
    }

    async fn generate_structured(&self, prompt: &str, model: Option<&str>) -> Result<Completion> {
        let model = self.resolve_model(model);
        // Lower temperature keeps the JSON output stable
        self.chat(STRUCTURED_SYSTEM_PROMPT, prompt, &model, 1500, 0.3)
            .await
    }
}
