//! Perplexity Sonar backend.
//!
//! Search-augmented chat completions. The wire format is OpenAI-shaped with a
//! few extra knobs and a top-level `citations` array in the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::openai::{send_chat, wire_messages, ChatMessage};
use super::traits::*;

/// Default sampling for observation calls when the caller sets none
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TOP_P: f32 = 0.9;
const DEFAULT_MAX_TOKENS: u32 = 1500;

pub struct PerplexityBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    capabilities: ModelCapabilities,
}

impl PerplexityBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured("Perplexity API key".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            capabilities: ModelCapabilities {
                context_window: 200_000,
                max_output_tokens: 8000,
                supports_json_mode: false,
                supports_citations: true,
            },
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct SonarRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    return_images: bool,
    return_related_questions: bool,
    top_k: u32,
    stream: bool,
    presence_penalty: f32,
    frequency_penalty: f32,
    web_search_options: WebSearchOptions,
}

#[derive(Debug, Serialize)]
struct WebSearchOptions {
    search_context_size: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<String>,
}

impl PerplexityBackend {
    fn build_request(&self, request: &CompletionRequest) -> SonarRequest {
        SonarRequest {
            model: self.model.clone(),
            messages: wire_messages(request),
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: request.top_p.unwrap_or(DEFAULT_TOP_P),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            return_images: false,
            return_related_questions: false,
            top_k: 0,
            stream: false,
            presence_penalty: 0.0,
            frequency_penalty: 1.0,
            web_search_options: WebSearchOptions {
                search_context_size: "medium",
                focus: request.search_focus.clone(),
            },
        }
    }
}

#[async_trait]
impl LlmBackend for PerplexityBackend {
    fn id(&self) -> &str {
        &self.model
    }

    /// Perplexity has no cheap listing endpoint; a configured key counts as available
    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        debug!(
            "Perplexity request: model={} max_tokens={} focus={:?}",
            body.model, body.max_tokens, body.web_search_options.focus
        );

        let auth = format!("Bearer {}", self.api_key);
        let response = send_chat(&self.client, &self.chat_completions_url(), Some(auth), &body).await?;
        debug!("Perplexity returned {} citations", response.citations.len());
        Ok(response)
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> PerplexityBackend {
        PerplexityBackend::new(
            "https://api.perplexity.ai/",
            "sonar-pro",
            "pplx-key",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        let result = PerplexityBackend::new("https://api.perplexity.ai", "sonar-pro", " ", Duration::from_secs(1));
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_request_body_carries_search_options() {
        let request = CompletionRequest::user("trends for data science")
            .with_system("industry data observer")
            .with_temperature(0.1)
            .with_top_p(0.8)
            .with_max_tokens(2500)
            .with_search_focus("technical");
        let body = serde_json::to_value(backend().build_request(&request)).unwrap();

        assert_eq!(body["model"], "sonar-pro");
        assert_eq!(body["max_tokens"], 2500);
        assert_eq!(body["return_images"], false);
        assert_eq!(body["return_related_questions"], false);
        assert_eq!(body["top_k"], 0);
        assert_eq!(body["frequency_penalty"], 1.0);
        assert_eq!(body["web_search_options"]["search_context_size"], "medium");
        assert_eq!(body["web_search_options"]["focus"], "technical");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_request_defaults_without_focus() {
        let body = serde_json::to_value(backend().build_request(&CompletionRequest::user("hi"))).unwrap();
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body["web_search_options"].get("focus").is_none());
        assert_eq!(backend().chat_completions_url(), "https://api.perplexity.ai/chat/completions");
    }
}
