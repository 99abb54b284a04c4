use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoderevError;
use crate::types::ApiKey;

/// Default endpoint root; requests go to `{base_url}/v1/chat/completions`.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default review dimensions used when the user does not supply a focus.
pub const DEFAULT_FOCUS: &str = "bugs, readability, maintainability, performance, tests";

/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration loaded from `.coderev.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use coderev_core::CoderevConfig;
///
/// let config = CoderevConfig::default();
/// assert_eq!(config.llm.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoderevConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
}

impl CoderevConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoderevError::Io`] if the file cannot be read, or
    /// [`CoderevError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, CoderevError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CoderevError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use coderev_core::CoderevConfig;
    ///
    /// let toml = r#"
    /// [review]
    /// focus = "security"
    /// "#;
    /// let config = CoderevConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.focus, "security");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CoderevError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Chat-completion provider configuration.
///
/// # Examples
///
/// ```
/// use coderev_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.endpoint(), "https://api.openai.com/v1/chat/completions");
/// assert!(config.timeout_secs.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<ApiKey>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Client-side request timeout. `None` leaves the transport default in place.
    pub timeout_secs: Option<u64>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Full URL of the chat-completion endpoint.
    pub fn endpoint(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/v1/chat/completions")
    }

    /// Pick the credential to use: an explicit flag wins over the
    /// environment, which wins over the config file.
    ///
    /// # Examples
    ///
    /// ```
    /// use coderev_core::LlmConfig;
    ///
    /// let config = LlmConfig::default();
    /// let key = config.resolve_api_key(None, Some("sk-env".into()));
    /// assert_eq!(key.unwrap().expose(), "sk-env");
    /// ```
    pub fn resolve_api_key(&self, flag: Option<String>, env: Option<String>) -> Option<ApiKey> {
        flag.or(env)
            .map(ApiKey::new)
            .or_else(|| self.api_key.clone())
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use coderev_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert!(config.focus.contains("readability"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Initial review focus for new sessions.
    #[serde(default = "default_focus")]
    pub focus: String,
}

fn default_focus() -> String {
    DEFAULT_FOCUS.into()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            focus: default_focus(),
        }
    }
}
