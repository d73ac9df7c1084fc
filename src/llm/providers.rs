//! The set of configured AI providers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{BedrockBackend, CachedBackend, LlmBackend, OpenAiBackend, PerplexityBackend};
use crate::cache::{CachePrefix, ResponseCache, TimeoutClass};
use crate::config::LlmArgs;

/// Providers available to the services. Any of them may be absent.
#[derive(Clone, Default)]
pub struct Providers {
    /// Groq (Llama): structuring and fallback replies
    pub groq: Option<Arc<dyn LlmBackend>>,
    /// Perplexity Sonar: observation with citations
    pub perplexity: Option<Arc<dyn LlmBackend>>,
    /// Bedrock (Claude): assessments and optional tutoring/coaching
    pub bedrock: Option<Arc<dyn LlmBackend>>,
}

impl Providers {
    /// Build every provider whose credentials are present.
    ///
    /// Groq and Perplexity replies are cached; Bedrock replies are not.
    pub async fn from_args(args: &LlmArgs, cache: Arc<ResponseCache>, timeout: Duration) -> Self {
        let mut providers = Self::default();

        if let Some(key) = args.groq_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            match OpenAiBackend::groq(&args.groq_base_url, &args.groq_model, key, timeout) {
                Ok(backend) => {
                    providers.groq = Some(Arc::new(CachedBackend::new(
                        Arc::new(backend),
                        cache.clone(),
                        CachePrefix::Groq,
                        TimeoutClass::Long,
                    )));
                }
                Err(e) => warn!("Groq client unavailable: {}", e),
            }
        }

        if let Some(key) = args.perplexity_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            match PerplexityBackend::new(&args.perplexity_base_url, &args.perplexity_model, key, timeout) {
                Ok(backend) => {
                    providers.perplexity = Some(Arc::new(CachedBackend::new(
                        Arc::new(backend),
                        cache.clone(),
                        CachePrefix::Perplexity,
                        TimeoutClass::Api,
                    )));
                }
                Err(e) => warn!("Perplexity client unavailable: {}", e),
            }
        }

        if args.bedrock_enabled && std::env::var_os("AWS_ACCESS_KEY_ID").is_some() {
            let backend = BedrockBackend::connect(&args.aws_region, &args.bedrock_model_id).await;
            providers.bedrock = Some(Arc::new(backend));
        } else if args.bedrock_enabled {
            info!("Bedrock enabled but no AWS credentials in the environment; skipping");
        }

        providers
    }

    /// Names of the configured providers, for the startup banner
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.groq.is_some() {
            names.push("groq");
        }
        if self.perplexity.is_some() {
            names.push("perplexity");
        }
        if self.bedrock.is_some() {
            names.push("bedrock");
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.groq.is_none() && self.perplexity.is_none() && self.bedrock.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTimeouts;
    use crate::llm::MockBackend;

    fn llm_args() -> LlmArgs {
        LlmArgs {
            groq_api_key: None,
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            groq_model: "llama".to_string(),
            perplexity_api_key: None,
            perplexity_base_url: "https://api.perplexity.ai".to_string(),
            perplexity_model: "sonar-pro".to_string(),
            aws_region: "us-east-1".to_string(),
            bedrock_model_id: "claude".to_string(),
            bedrock_enabled: false,
        }
    }

    fn cache() -> Arc<ResponseCache> {
        Arc::new(ResponseCache::disabled(CacheTimeouts::default()))
    }

    #[tokio::test]
    async fn test_no_keys_means_no_providers() {
        let providers = Providers::from_args(&llm_args(), cache(), Duration::from_secs(1)).await;
        assert!(providers.is_empty());
        assert!(providers.names().is_empty());
    }

    #[tokio::test]
    async fn test_keys_enable_http_providers() {
        let mut args = llm_args();
        args.groq_api_key = Some("gsk".to_string());
        args.perplexity_api_key = Some("pplx".to_string());
        let providers = Providers::from_args(&args, cache(), Duration::from_secs(1)).await;
        assert_eq!(providers.names(), vec!["groq", "perplexity"]);
        assert_eq!(providers.groq.as_ref().unwrap().id(), "llama");
    }

    #[test]
    fn test_manual_assembly() {
        let providers = Providers {
            bedrock: Some(Arc::new(MockBackend::default())),
            ..Default::default()
        };
        assert_eq!(providers.names(), vec!["bedrock"]);
    }
}
