//! AI provider dispatch — picks one configured backend per request, invokes
//! it, and normalizes the response into a uniform result shape.
//!
//! Built-in backends:
//! - **Gemini**     -- Google AI Studio REST API (primary)
//! - **OpenAI**     -- chat completions API
//! - **Anthropic**  -- messages API
//!
//! Every path through the dispatcher terminates in a result with `success`
//! explicitly set; backend and parse failures are converted into results
//! carrying a deterministic local-template fallback instead of propagating.

pub mod backlog;
pub mod fallback;
pub mod prompts;

mod anthropic;
mod gemini;
mod openai;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::AiConfig;
use crate::error::Result;

// -- Request types ----------------------------------------------------------

/// Optional caller-supplied metadata used to enrich prompts.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub user_position: Option<String>,
    pub project_name: Option<String>,
    pub date: Option<String>,
    pub estimated_hours: Option<f64>,
    pub sprint: Option<String>,
    pub epic: Option<String>,
    pub related_tickets: Option<String>,
}

/// Category of backlog item being generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Feature,
    BugFix,
    Improvement,
    TechnicalDebt,
    Research,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::BugFix => "bug_fix",
            Self::Improvement => "improvement",
            Self::TechnicalDebt => "technical_debt",
            Self::Research => "research",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feature" => Some(Self::Feature),
            "bug_fix" => Some(Self::BugFix),
            "improvement" => Some(Self::Improvement),
            "technical_debt" => Some(Self::TechnicalDebt),
            "research" => Some(Self::Research),
            _ => None,
        }
    }

    /// Human-readable form used in fallback task titles.
    pub fn title_case(&self) -> &'static str {
        match self {
            Self::Feature => "Feature",
            Self::BugFix => "Bug Fix",
            Self::Improvement => "Improvement",
            Self::TechnicalDebt => "Technical Debt",
            Self::Research => "Research",
        }
    }

    /// Label form: underscores become hyphens.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::BugFix => "bug-fix",
            Self::Improvement => "improvement",
            Self::TechnicalDebt => "technical-debt",
            Self::Research => "research",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Result types -----------------------------------------------------------

/// Outcome of a plain-text activity generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u32>,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Always present when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_description: Option<String>,
}

/// The Jira-style multi-field backlog item shape providers are asked to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub story_points: String,
    pub priority: String,
    pub labels: Vec<String>,
    pub component: String,
}

/// Outcome of a structured backlog-item generation.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredTaskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_data: Option<TaskData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub task_type: TaskType,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Always present when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_task: Option<TaskData>,
}

// -- Backend trait ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Normalized response from any backend.
pub struct Completion {
    pub text: String,
    /// The model that actually served the request.
    pub model: String,
    pub total_tokens: Option<u32>,
}

/// Uniform interface over the generative-text providers.
#[async_trait::async_trait]
pub trait TextBackend: Send + Sync {
    fn provider(&self) -> Provider;

    /// Generate a plain-text completion for the given prompt.
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<Completion>;

    /// Generate a completion instructed to contain JSON only.
    async fn generate_structured(&self, prompt: &str, model: Option<&str>) -> Result<Completion>;
}

// -- Availability & selection -----------------------------------------------

const OPENAI_KEY_PLACEHOLDER: &str = "your_openai_api_key_here";
const ANTHROPIC_KEY_PLACEHOLDER: &str = "your_anthropic_api_key_here";

/// Which backends have usable credentials. Computed once at startup and
/// immutable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub gemini: bool,
    pub openai: bool,
    pub anthropic: bool,
}

impl Availability {
    /// Shape-check the resolved credentials. Placeholder values left over
    /// from a copied example config do not count as configured.
    pub fn from_keys(gemini_key: &str, openai_key: &str, anthropic_key: &str) -> Self {
        Self {
            // Valid Gemini key format
            gemini: gemini_key.starts_with("AIza"),
            openai: !openai_key.is_empty() && openai_key != OPENAI_KEY_PLACEHOLDER,
            anthropic: !anthropic_key.is_empty() && anthropic_key != ANTHROPIC_KEY_PLACEHOLDER,
        }
    }

    pub fn get(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gemini => self.gemini,
            Provider::OpenAi => self.openai,
            Provider::Anthropic => self.anthropic,
        }
    }

    pub fn any(&self) -> bool {
        self.gemini || self.openai || self.anthropic
    }
}

/// Pick the backend for a request. First match wins:
///   1. explicit model hint with a recognized family prefix, if available
///   2. the configured primary provider, if available
///   3. first available backend in fixed order gemini → openai → anthropic
///   4. none — caller uses the local fallback
pub(crate) fn select_provider(
    availability: &Availability,
    model_hint: Option<&str>,
    preferred: &str,
) -> Option<Provider> {
    if let Some(model) = model_hint {
        let family = if model.starts_with("gemini") {
            Some(Provider::Gemini)
        } else if model.starts_with("gpt") {
            Some(Provider::OpenAi)
        } else if model.starts_with("claude") {
            Some(Provider::Anthropic)
        } else {
            None
        };
        if let Some(p) = family {
            if availability.get(p) {
                return Some(p);
            }
        }
    }

    let preference = match preferred {
        "gemini" => Some(Provider::Gemini),
        "openai" => Some(Provider::OpenAi),
        "anthropic" => Some(Provider::Anthropic),
        _ => None,
    };
    if let Some(p) = preference {
        if availability.get(p) {
            return Some(p);
        }
    }

    [Provider::Gemini, Provider::OpenAi, Provider::Anthropic]
        .into_iter()
        .find(|p| availability.get(*p))
}

// -- Dispatcher -------------------------------------------------------------

/// Unified generator that dispatches to one of the configured backends and
/// guarantees a usable result under all failure modes.
pub struct Generator {
    availability: Availability,
    preferred: String,
    activity_prompt: String,
    backends: Vec<Arc<dyn TextBackend>>,
}

impl Generator {
    /// Build the generator from config. Availability is computed here, once,
    /// from the resolved credentials.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let availability = Availability::from_keys(
            &config.resolved_gemini_api_key(),
            &config.resolved_openai_api_key(),
            &config.resolved_anthropic_api_key(),
        );

        info!(
            gemini = availability.gemini,
            openai = availability.openai,
            anthropic = availability.anthropic,
            "AI providers available"
        );
        if !availability.any() {
            warn!("no AI providers are properly configured; using local templates");
        }

        let backends: Vec<Arc<dyn TextBackend>> = vec![
            Arc::new(gemini::GeminiEngine::new(config)?),
            Arc::new(openai::OpenAiEngine::new(config)?),
            Arc::new(anthropic::AnthropicEngine::new(config)?),
        ];

        Ok(Self {
            availability,
            preferred: config.primary_provider.clone(),
            activity_prompt: config.activity_prompt.clone(),
            backends,
        })
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    fn backend(&self, provider: Provider) -> Option<&dyn TextBackend> {
        self.backends
            .iter()
            .find(|b| b.provider() == provider)
            .map(|b| b.as_ref())
    }

    /// Generate an activity description. Total: never returns an error; the
    /// worst case is a failed result carrying a template fallback.
    pub async fn generate_activity(
        &self,
        user_input: &str,
        context: Option<&GenerationContext>,
        model: Option<&str>,
    ) -> GenerationResult {
        let prompt = prompts::build_activity_prompt(&self.activity_prompt, user_input, context);

        let selected = select_provider(&self.availability, model, &self.preferred)
            .and_then(|p| self.backend(p).map(|b| (p, b)));
        let Some((provider, backend)) = selected else {
            debug!("no AI provider available, using local template");
            return fallback::activity(user_input, context);
        };

        debug!(
            provider = provider.tag(),
            model = ?model,
            prompt_len = prompt.len(),
            "dispatching activity generation"
        );

        match backend.generate(&prompt, model).await {
            Ok(completion) => GenerationResult {
                success: true,
                description: Some(completion.text),
                model_used: Some(completion.model),
                provider: Some(provider.tag().to_string()),
                token_usage: completion.total_tokens,
                is_fallback: false,
                error: None,
                fallback_description: None,
            },
            Err(e) => {
                error!(provider = provider.tag(), err = %e, "AI generation failed");
                let fb = fallback::activity(user_input, context);
                GenerationResult {
                    success: false,
                    description: None,
                    model_used: None,
                    provider: None,
                    token_usage: None,
                    is_fallback: false,
                    error: Some(e.to_string()),
                    fallback_description: fb.description,
                }
            }
        }
    }

    /// Generate a structured backlog item. Total; parse failures on the
    /// provider's output yield the fallback template rather than an error.
    pub async fn generate_task(
        &self,
        user_input: &str,
        context: Option<&GenerationContext>,
        model: Option<&str>,
        task_type: TaskType,
    ) -> StructuredTaskResult {
        let position = context
            .and_then(|c| c.user_position.as_deref())
            .unwrap_or("")
            .to_lowercase();
        let prompt = backlog::build_task_prompt(user_input, &position, task_type, context);

        let selected = select_provider(&self.availability, model, &self.preferred)
            .and_then(|p| self.backend(p).map(|b| (p, b)));
        let Some((provider, backend)) = selected else {
            debug!("no AI provider available, using fallback task template");
            return fallback::task(user_input, context, task_type);
        };

        debug!(
            provider = provider.tag(),
            model = ?model,
            task_type = %task_type,
            "dispatching task generation"
        );

        match backend.generate_structured(&prompt, model).await {
            Ok(completion) => match parse_task_response(&completion, provider, task_type) {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        provider = provider.tag(),
                        err = %e,
                        "failed to parse structured response, using fallback template"
                    );
                    fallback::task(user_input, context, task_type)
                }
            },
            Err(e) => {
                error!(provider = provider.tag(), err = %e, "task generation failed");
                StructuredTaskResult {
                    success: false,
                    task_data: None,
                    model_used: None,
                    provider: None,
                    task_type,
                    is_fallback: false,
                    error: Some(e.to_string()),
                    fallback_task: Some(fallback::task_data(user_input, context, task_type)),
                }
            }
        }
    }
}

/// Strip markdown code-fence wrapping that some providers add around JSON
/// despite being told not to.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```json") {
        trimmed.replace("```json", "").replace("```", "").trim().to_string()
    } else if trimmed.starts_with("```") {
        trimmed.replace("```", "").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_task_response(
    completion: &Completion,
    provider: Provider,
    task_type: TaskType,
) -> std::result::Result<StructuredTaskResult, serde_json::Error> {
    let cleaned = strip_code_fences(&completion.text);
    let task_data: TaskData = serde_json::from_str(&cleaned)?;
    Ok(StructuredTaskResult {
        success: true,
        task_data: Some(task_data),
        model_used: Some(completion.model.clone()),
        provider: Some(provider.tag().to_string()),
        task_type,
        is_fallback: false,
        error: None,
        fallback_task: None,
    })
}
