//! Cache-aside wrapper for provider completions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::traits::*;
use crate::cache::{cache_key, content_hash, CachePrefix, ResponseCache, TimeoutClass};

/// Serves repeated completions from Redis.
///
/// The key covers model, system prompt, final user prompt and temperature.
/// Cache misses and cache failures both fall through to the wrapped backend.
pub struct CachedBackend {
    inner: Arc<dyn LlmBackend>,
    cache: Arc<ResponseCache>,
    prefix: CachePrefix,
    class: TimeoutClass,
}

impl CachedBackend {
    pub fn new(
        inner: Arc<dyn LlmBackend>,
        cache: Arc<ResponseCache>,
        prefix: CachePrefix,
        class: TimeoutClass,
    ) -> Self {
        Self {
            inner,
            cache,
            prefix,
            class,
        }
    }

    fn key_for(&self, request: &CompletionRequest) -> String {
        let material = format!(
            "{}|{}|{}|{:?}",
            self.inner.id(),
            request.system_prompt.as_deref().unwrap_or(""),
            request.prompt(),
            request.temperature
        );
        cache_key(self.prefix, &content_hash(&material), None)
    }
}

#[async_trait]
impl LlmBackend for CachedBackend {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let key = self.key_for(&request);
        if let Some(hit) = self.cache.get::<CompletionResponse>(&key).await {
            debug!("Serving {} completion from cache", self.prefix.as_str());
            return Ok(hit);
        }

        let response = self.inner.complete(request).await?;
        if !response.content.is_empty() {
            self.cache.set(&key, &response, self.class).await;
        }
        Ok(response)
    }

    fn capabilities(&self) -> &ModelCapabilities {
        self.inner.capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTimeouts;
    use crate::llm::MockBackend;

    fn wrap(mock: Arc<MockBackend>) -> CachedBackend {
        CachedBackend::new(
            mock,
            Arc::new(ResponseCache::disabled(CacheTimeouts::default())),
            CachePrefix::Groq,
            TimeoutClass::Long,
        )
    }

    #[tokio::test]
    async fn test_disabled_cache_falls_through() {
        let mock = Arc::new(MockBackend::new("llama").with_response("fresh"));
        let cached = wrap(mock.clone());

        for _ in 0..2 {
            let response = cached.complete(CompletionRequest::user("q")).await.unwrap();
            assert_eq!(response.content, "fresh");
        }
        assert_eq!(mock.call_count(), 2);
        assert_eq!(cached.id(), "llama");
    }

    #[test]
    fn test_key_depends_on_prompt_and_temperature() {
        let cached = wrap(Arc::new(MockBackend::new("llama")));
        let a = cached.key_for(&CompletionRequest::user("q").with_temperature(0.1));
        let b = cached.key_for(&CompletionRequest::user("q").with_temperature(0.7));
        let c = cached.key_for(&CompletionRequest::user("other").with_temperature(0.1));

        assert!(a.starts_with("pbsc:groq:"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, cached.key_for(&CompletionRequest::user("q").with_temperature(0.1)));
    }
}
