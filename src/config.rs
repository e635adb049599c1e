use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, WrittenError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "default_server_bind")]
    pub server_bind: String,

    /// Path to the SQLite database file.
    /// Empty = `$XDG_DATA_HOME/written/written.db`.
    #[serde(default)]
    pub database_path: String,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub taiga: TaigaConfig,
}

// -- AI providers --------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Provider used when no model hint is given: "gemini" (default),
    /// "openai", or "anthropic".
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,

    /// Per-call timeout for provider HTTP requests, in seconds.
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,

    /// Base instruction for plain-text activity generation.
    #[serde(default = "default_activity_prompt")]
    pub activity_prompt: String,

    /// Token budget for a generated activity description.
    #[serde(default = "default_max_activity_tokens")]
    pub max_activity_tokens: u32,

    // -- Gemini (primary) --

    /// Google AI Studio API key. Can be overridden with `GEMINI_API_KEY`.
    #[serde(default)]
    pub gemini_api_key: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    // -- OpenAI (optional) --

    /// OpenAI API key. Can be overridden with `OPENAI_API_KEY`.
    #[serde(default)]
    pub openai_api_key: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    // -- Anthropic (optional) --

    /// Anthropic API key. Can be overridden with `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub anthropic_api_key: String,

    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
}

impl AiConfig {
    /// Gemini key after env overlay (`GEMINI_API_KEY` wins over config).
    pub fn resolved_gemini_api_key(&self) -> String {
        env_or("GEMINI_API_KEY", &self.gemini_api_key)
    }

    pub fn resolved_openai_api_key(&self) -> String {
        env_or("OPENAI_API_KEY", &self.openai_api_key)
    }

    pub fn resolved_anthropic_api_key(&self) -> String {
        env_or("ANTHROPIC_API_KEY", &self.anthropic_api_key)
    }
}

// -- Taiga ---------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TaigaConfig {
    /// Base URL of the Taiga instance, without trailing slash.
    #[serde(default = "default_taiga_base_url")]
    pub base_url: String,

    /// Username for password auth. Can be overridden with `TAIGA_USERNAME`.
    #[serde(default)]
    pub username: String,

    /// Password for password auth. Can be overridden with `TAIGA_PASSWORD`.
    #[serde(default)]
    pub password: String,

    /// Pre-issued auth token; takes precedence over username/password.
    /// Can be overridden with `TAIGA_AUTH_TOKEN`.
    #[serde(default)]
    pub auth_token: String,
}

impl TaigaConfig {
    pub fn resolved_username(&self) -> String {
        env_or("TAIGA_USERNAME", &self.username)
    }

    pub fn resolved_password(&self) -> String {
        env_or("TAIGA_PASSWORD", &self.password)
    }

    pub fn resolved_auth_token(&self) -> String {
        env_or("TAIGA_AUTH_TOKEN", &self.auth_token)
    }
}

// -- Defaults ------------------------------------------------------------

fn default_server_bind() -> String {
    "127.0.0.1:5001".to_string()
}

fn default_primary_provider() -> String {
    "gemini".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    30
}

fn default_activity_prompt() -> String {
    "Generate a professional daily activity description based on the following information:"
        .to_string()
}

fn default_max_activity_tokens() -> u32 {
    500
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_taiga_base_url() -> String {
    "https://api.taiga.io".to_string()
}

fn env_or(var: &str, fallback: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_bind: default_server_bind(),
            database_path: String::new(),
            ai: AiConfig::default(),
            taiga: TaigaConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            primary_provider: default_primary_provider(),
            timeout_secs: default_ai_timeout_secs(),
            activity_prompt: default_activity_prompt(),
            max_activity_tokens: default_max_activity_tokens(),
            gemini_api_key: String::new(),
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            anthropic_api_key: String::new(),
            anthropic_model: default_anthropic_model(),
            anthropic_base_url: default_anthropic_base_url(),
        }
    }
}

impl Default for TaigaConfig {
    fn default() -> Self {
        Self {
            base_url: default_taiga_base_url(),
            username: String::new(),
            password: String::new(),
            auth_token: String::new(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(WrittenError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| WrittenError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/written/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("written")
            .join("config.toml")
    }

    /// Returns the data directory: `$XDG_DATA_HOME/written/`
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("written")
    }

    /// Resolved database file path.
    pub fn database_path(&self) -> PathBuf {
        if self.database_path.is_empty() {
            Self::data_dir().join("written.db")
        } else {
            PathBuf::from(&self.database_path)
        }
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let c = Config::default();
        assert_eq!(c.server_bind, "127.0.0.1:5001");
        assert!(c.database_path.is_empty());
        assert_eq!(c.ai.primary_provider, "gemini");
        assert_eq!(c.ai.timeout_secs, 30);
        assert_eq!(c.ai.max_activity_tokens, 500);
    }

    #[test]
    fn default_ai_models() {
        let ai = AiConfig::default();
        assert_eq!(ai.gemini_model, "gemini-2.5-flash");
        assert_eq!(ai.openai_model, "gpt-3.5-turbo");
        assert_eq!(ai.anthropic_model, "claude-3-sonnet-20240229");
        assert!(ai.gemini_api_key.is_empty());
        assert!(ai.openai_api_key.is_empty());
        assert!(ai.anthropic_api_key.is_empty());
    }

    #[test]
    fn parse_minimal_toml() {
        let c: Config = toml::from_str(r#"server_bind = "0.0.0.0:8080""#).unwrap();
        assert_eq!(c.server_bind, "0.0.0.0:8080");
        assert_eq!(c.ai.primary_provider, "gemini");
    }

    #[test]
    fn parse_ai_section() {
        let toml_str = r#"
        [ai]
        primary_provider = "openai"
        openai_api_key = "sk-test"
        timeout_secs = 10
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.ai.primary_provider, "openai");
        assert_eq!(c.ai.openai_api_key, "sk-test");
        assert_eq!(c.ai.timeout_secs, 10);
    }

    #[test]
    fn parse_taiga_section() {
        let toml_str = r#"
        [taiga]
        base_url = "https://tree.taiga.example"
        username = "alice"
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.taiga.base_url, "https://tree.taiga.example");
        assert_eq!(c.taiga.username, "alice");
        assert!(c.taiga.auth_token.is_empty());
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let c = Config::load(Some(Path::new("/tmp/nonexistent-written-test.toml"))).unwrap();
        assert_eq!(c.server_bind, "127.0.0.1:5001");
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let path = std::env::temp_dir().join("bad-written.toml");
        std::fs::write(&path, "this is not valid %%% toml").unwrap();
        let result = Config::load(Some(&path));
        assert!(result.is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn default_config_path_has_written() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("written"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn database_path_override() {
        let mut c = Config::default();
        c.database_path = "/tmp/custom.db".to_string();
        assert_eq!(c.database_path(), PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn default_config_contents_is_non_empty() {
        let contents = Config::default_config_contents();
        assert!(!contents.is_empty());
    }
}
