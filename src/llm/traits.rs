//! Core traits for AI providers.
//!
//! `LlmBackend` is the seam every provider (Groq, Perplexity, Bedrock, the
//! cache wrapper and the test mock) sits behind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::IgniteError;

/// Error types for provider calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Backend is not available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// No API key or credentials configured
    #[error("{0} not configured")]
    NotConfigured(String),

    /// Provider rejected the credentials (401/403)
    #[error("API key invalid or unauthorized")]
    Unauthorized,

    /// Request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Quota exhausted or rate limited (429)
    #[error("Quota exceeded or rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LlmError> for IgniteError {
    fn from(err: LlmError) -> Self {
        IgniteError::Upstream(err.to_string())
    }
}

/// Map a non-success HTTP status from a provider into an error.
pub fn status_error(status: u16, retry_after: Option<&str>, body: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::Unauthorized,
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000),
        },
        _ => {
            let snippet: String = body.chars().take(300).collect();
            LlmError::RequestFailed(format!("HTTP {}: {}", status, snippet))
        }
    }
}

/// Core trait for AI providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend identifier (e.g., model name).
    fn id(&self) -> &str;

    /// Check if the backend is currently available.
    async fn is_available(&self) -> bool;

    /// Generate a completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Get the capabilities of this backend.
    fn capabilities(&self) -> &ModelCapabilities;
}

/// Request for a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    /// Temperature (0.0-2.0)
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Search focus hint for search-augmented providers ("technical", "educational")
    pub search_focus: Option<String>,
    /// Ask for a JSON object response where the provider supports it
    pub json_output: bool,
}

impl CompletionRequest {
    /// Create a new request with a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    pub fn with_search_focus(mut self, focus: impl Into<String>) -> Self {
        self.search_focus = Some(focus.into());
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Text of the final user message
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role name; anything unknown is treated as the user
    pub fn parse(role: &str) -> Self {
        match role {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

/// Response from a completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    /// Source URLs returned by search-augmented providers
    #[serde(default)]
    pub citations: Vec<String>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            citations: Vec::new(),
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

impl FinishReason {
    pub fn parse(reason: Option<&str>) -> Self {
        match reason {
            Some("length") | Some("max_tokens") => Self::Length,
            Some("content_filter") => Self::ContentFilter,
            _ => Self::Stop,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Capabilities of a model/backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub supports_json_mode: bool,
    pub supports_citations: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            context_window: 4096,
            max_output_tokens: 1024,
            supports_json_mode: false,
            supports_citations: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_clamps_sampling_parameters() {
        let request = CompletionRequest::user("hi")
            .with_temperature(3.5)
            .with_top_p(1.5)
            .with_max_tokens(100);
        assert_eq!(request.temperature, Some(2.0));
        assert_eq!(request.top_p, Some(1.0));
        assert_eq!(request.max_tokens, Some(100));
        assert_eq!(request.prompt(), "hi");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error(401, None, ""), LlmError::Unauthorized));
        assert!(matches!(status_error(403, None, ""), LlmError::Unauthorized));
        assert!(matches!(
            status_error(429, Some("2"), ""),
            LlmError::RateLimited { retry_after_ms: Some(2000) }
        ));
        assert!(matches!(status_error(500, None, "boom"), LlmError::RequestFailed(_)));
    }

    #[test]
    fn test_upstream_messages() {
        let err: IgniteError = LlmError::Unauthorized.into();
        assert_eq!(err.public_message(), "API key invalid or unauthorized");
        assert_eq!(err.code(), "UPSTREAM_ERROR");

        let err: IgniteError = LlmError::RateLimited { retry_after_ms: None }.into();
        assert_eq!(err.public_message(), "Quota exceeded or rate limited");
    }
}
