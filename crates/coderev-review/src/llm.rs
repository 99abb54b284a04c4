use std::time::Duration;

use async_trait::async_trait;
use coderev_core::{ApiKey, CoderevError, LlmConfig};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::prompt::ReviewRequest;

/// Sampling temperature for every review request.
pub const TEMPERATURE: f32 = 0.2;

/// Review text used when a successful response carries no message content.
pub const NO_CONTENT_FALLBACK: &str = "The model returned no response.";

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use coderev_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this code".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use coderev_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// Something that can turn a [`ReviewRequest`] into review text.
///
/// The session is generic over this so the provider can be swapped out.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    /// Submit one review request. Single attempt, no retry.
    ///
    /// # Errors
    ///
    /// [`CoderevError::MissingCredential`] for a blank key,
    /// [`CoderevError::Provider`] for a non-success status, and
    /// [`CoderevError::Network`] for transport failures.
    async fn submit(
        &self,
        credential: &ApiKey,
        request: &ReviewRequest,
    ) -> Result<String, CoderevError>;
}

/// Reject a blank credential before anything touches the network.
///
/// # Examples
///
/// ```
/// use coderev_core::ApiKey;
/// use coderev_review::llm::require_credential;
///
/// assert!(require_credential(&ApiKey::new("  ")).is_err());
/// assert_eq!(require_credential(&ApiKey::new(" sk-1 ")).unwrap(), "sk-1");
/// ```
pub fn require_credential(credential: &ApiKey) -> Result<&str, CoderevError> {
    if credential.is_blank() {
        return Err(CoderevError::MissingCredential);
    }
    Ok(credential.expose().trim())
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint.
///
/// # Examples
///
/// ```
/// use coderev_core::LlmConfig;
/// use coderev_review::llm::LlmClient;
///
/// let client = LlmClient::new(&LlmConfig::default()).unwrap();
/// assert_eq!(client.model(), "gpt-4o-mini");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoderevError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, CoderevError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| CoderevError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
            model: config.model.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Return the full chat-completion URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReviewBackend for LlmClient {
    async fn submit(
        &self,
        credential: &ApiKey,
        request: &ReviewRequest,
    ) -> Result<String, CoderevError> {
        let key = require_credential(credential)?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "messages": request.messages(),
        });

        tracing::debug!(
            model = %self.model,
            endpoint = %self.endpoint,
            prompt_chars = request.user_prompt.chars().count(),
            "sending review request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CoderevError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read provider error body");
                    String::new()
                }
            };
            tracing::debug!(status = status.as_u16(), "provider rejected review request");
            return Err(CoderevError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| CoderevError::Network(e.to_string()))?;
        Ok(extract_content(&text))
    }
}

/// Pull `choices[0].message.content` out of a completion envelope,
/// falling back to [`NO_CONTENT_FALLBACK`] when it is missing.
fn extract_content(body: &str) -> String {
    let envelope: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("failed to parse completion response: {e}");
            return NO_CONTENT_FALLBACK.to_string();
        }
    };

    match envelope
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
    {
        Some(content) => content.to_string(),
        None => {
            tracing::warn!("completion response had no message content");
            NO_CONTENT_FALLBACK.to_string()
        }
    }
}
