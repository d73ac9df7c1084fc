//! Mock provider for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::*;

/// Mock backend with configurable responses.
///
/// Queued responses are consumed first, in order; once the queue is empty
/// every call returns the fixed response.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    capabilities: ModelCapabilities,
    response_content: String,
    citations: Vec<String>,
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    last_request: Mutex<Option<CompletionRequest>>,
    call_count: AtomicU32,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            capabilities: ModelCapabilities::default(),
            response_content: "Mock response".to_string(),
            citations: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            last_request: Mutex::new(None),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    pub fn with_citations(mut self, citations: Vec<String>) -> Self {
        self.capabilities.supports_citations = !citations.is_empty();
        self.citations = citations;
        self
    }

    /// Queue a one-shot reply ahead of the fixed response
    pub fn push_response(&self, content: impl Into<String>) {
        guard(&self.queue).push_back(Ok(content.into()));
    }

    /// Queue a one-shot failure
    pub fn push_error(&self, error: LlmError) {
        guard(&self.queue).push_back(Err(error));
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The most recent request seen by `complete`
    pub fn last_request(&self) -> Option<CompletionRequest> {
        guard(&self.last_request).clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.available.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable("Mock backend disabled".to_string()));
        }

        let prompt_tokens: u32 = request
            .messages
            .iter()
            .map(|m| m.content.len() as u32 / 4)
            .sum();
        *guard(&self.last_request) = Some(request);

        let content = match guard(&self.queue).pop_front() {
            Some(queued) => queued?,
            None => self.response_content.clone(),
        };
        let completion_tokens = content.len() as u32 / 4;

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
            },
            citations: self.citations.clone(),
        })
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend() {
        let backend = MockBackend::new("test-model").with_response("Hello, world!");

        assert!(backend.is_available().await);
        assert_eq!(backend.call_count(), 0);

        let response = backend.complete(CompletionRequest::user("Hi")).await.unwrap();

        assert_eq!(response.content, "Hello, world!");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.last_request().unwrap().prompt(), "Hi");
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let backend = MockBackend::new("test-model").with_available(false);

        assert!(!backend.is_available().await);
        assert!(backend.complete(CompletionRequest::user("Hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_queue_drains_before_fixed_response() {
        let backend = MockBackend::default().with_response("fixed");
        backend.push_error(LlmError::Unauthorized);
        backend.push_response("first");

        assert!(matches!(
            backend.complete(CompletionRequest::user("a")).await,
            Err(LlmError::Unauthorized)
        ));
        assert_eq!(backend.complete(CompletionRequest::user("b")).await.unwrap().content, "first");
        assert_eq!(backend.complete(CompletionRequest::user("c")).await.unwrap().content, "fixed");
    }

    #[tokio::test]
    async fn test_citations_are_returned() {
        let backend = MockBackend::default().with_citations(vec!["https://docs.rs".to_string()]);
        let response = backend.complete(CompletionRequest::user("x")).await.unwrap();
        assert_eq!(response.citations, vec!["https://docs.rs"]);
        assert!(backend.capabilities().supports_citations);
    }
}
