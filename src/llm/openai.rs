//! OpenAI-compatible chat completions backend.
//!
//! Used for Groq (Llama models), which exposes the OpenAI wire format under
//! `https://api.groq.com/openai/v1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::*;

/// OpenAI-compatible backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    capabilities: ModelCapabilities,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            capabilities: ModelCapabilities {
                context_window: 128_000,
                max_output_tokens: 8192,
                supports_json_mode: true,
                supports_citations: false,
            },
        })
    }

    /// Create a backend for the Groq API.
    pub fn groq(
        base_url: &str,
        model: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Self::new(base_url, model, Some(api_key.into()), timeout)
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatRequest>,
    stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormatRequest {
    #[serde(rename = "type")]
    format_type: String,
}

/// Chat completion response (shared with Perplexity, which adds `citations`).
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<UsageResponse>,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: MessageResponse,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsageResponse {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Flatten system prompt and conversation into wire messages
pub(crate) fn wire_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system_prompt {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }
    for msg in &request.messages {
        messages.push(ChatMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        });
    }
    messages
}

/// Turn a decoded chat response into a completion
pub(crate) fn into_completion(chat_response: ChatResponse) -> Result<CompletionResponse, LlmError> {
    let choice = chat_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))?;

    let usage = chat_response
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default().trim().to_string(),
        finish_reason: FinishReason::parse(choice.finish_reason.as_deref()),
        usage,
        citations: chat_response.citations,
    })
}

/// Send a prepared request and decode an OpenAI-shaped response
pub(crate) async fn send_chat<B: Serialize>(
    client: &Client,
    url: &str,
    auth: Option<String>,
    body: &B,
) -> Result<CompletionResponse, LlmError> {
    let mut http_request = client.post(url);
    if let Some(auth) = auth {
        http_request = http_request.header(header::AUTHORIZATION, auth);
    }

    let response = http_request
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, retry_after.as_deref(), &body));
    }

    let chat_response: ChatResponse = response
        .json()
        .await
        .map_err(|e| LlmError::ParseError(e.to_string()))?;

    into_completion(chat_response)
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);

        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
        }

        request
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages: wire_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            response_format: request.json_output.then(|| ResponseFormatRequest {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        };

        debug!("Groq request: model={} messages={}", self.model, chat_request.messages.len());
        send_chat(&self.client, &self.chat_completions_url(), self.auth_header(), &chat_request).await
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groq_creation() {
        let backend = OpenAiBackend::groq(
            "https://api.groq.com/openai/v1/",
            "meta-llama/llama-4-scout-17b-16e-instruct",
            "key",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(backend.id(), "meta-llama/llama-4-scout-17b-16e-instruct");
        assert_eq!(
            backend.chat_completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert!(backend.capabilities().supports_json_mode);
    }

    #[test]
    fn test_wire_messages_put_system_first() {
        let request = CompletionRequest::user("question")
            .with_system("be brief")
            .with_message(Message::assistant("answer"));
        let wire = wire_messages(&request);
        let roles: Vec<_> = wire.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[test]
    fn test_into_completion_requires_a_choice() {
        let empty = ChatResponse {
            choices: vec![],
            usage: None,
            citations: vec![],
        };
        assert!(matches!(into_completion(empty), Err(LlmError::ParseError(_))));
    }
}
