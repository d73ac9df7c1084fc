//! AWS Bedrock backend for Anthropic Claude models.
//!
//! Credentials come from the AWS SDK's default chain
//! (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`, profiles, instance roles).

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::traits::*;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.7;

pub struct BedrockBackend {
    client: Client,
    model_id: String,
    capabilities: ModelCapabilities,
}

impl BedrockBackend {
    /// Build a client for the given region using the default credential chain
    pub async fn connect(region: &str, model_id: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        let model_id = model_id.into();
        info!("Bedrock client ready (region {}, model {})", region, model_id);

        Self {
            client: Client::new(&config),
            model_id,
            capabilities: ModelCapabilities {
                context_window: 200_000,
                max_output_tokens: 8192,
                supports_json_mode: false,
                supports_citations: false,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct InvokeBody {
    anthropic_version: &'static str,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    /// Legacy text-completions field
    completion: Option<String>,
    stop_reason: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Claude takes the system prompt out of band; system messages are folded into it
fn invoke_body(request: &CompletionRequest) -> InvokeBody {
    let mut system = request.system_prompt.clone();
    let mut messages = Vec::with_capacity(request.messages.len());
    for msg in &request.messages {
        match msg.role {
            MessageRole::System => {
                system = Some(match system {
                    Some(existing) => format!("{}\n\n{}", existing, msg.content),
                    None => msg.content.clone(),
                });
            }
            MessageRole::User => messages.push(ClaudeMessage {
                role: "user",
                content: msg.content.clone(),
            }),
            MessageRole::Assistant => messages.push(ClaudeMessage {
                role: "assistant",
                content: msg.content.clone(),
            }),
        }
    }

    InvokeBody {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        system,
    }
}

fn parse_invoke_response(bytes: &[u8]) -> Result<CompletionResponse, LlmError> {
    let parsed: InvokeResponse =
        serde_json::from_slice(bytes).map_err(|e| LlmError::ParseError(e.to_string()))?;

    let content = parsed
        .content
        .into_iter()
        .find_map(|block| block.text)
        .or(parsed.completion)
        .ok_or_else(|| LlmError::ParseError("No text in Bedrock response".to_string()))?;

    let usage = parsed
        .usage
        .map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content: content.trim().to_string(),
        finish_reason: FinishReason::parse(parsed.stop_reason.as_deref()),
        usage,
        citations: Vec::new(),
    })
}

#[async_trait]
impl LlmBackend for BedrockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = serde_json::to_vec(&invoke_body(&request))
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        debug!("Bedrock request: model={} bytes={}", self.model_id, body.len());

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_throttling_exception() => LlmError::RateLimited { retry_after_ms: None },
                Some(err) if err.is_access_denied_exception() => LlmError::Unauthorized,
                Some(err) => LlmError::RequestFailed(err.to_string()),
                None => LlmError::NetworkError(e.to_string()),
            })?;

        parse_invoke_response(output.body().as_ref())
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}
