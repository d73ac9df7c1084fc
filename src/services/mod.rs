//! Business logic between the HTTP routes, MongoDB and the AI providers
//!
//! ## Services
//!
//! - **profile**: profile summaries used to personalize prompts
//! - **roadmap**: multi-level roadmap generation and resource enhancement
//! - **learning_plan**: weekly schedules for a roadmap phase
//! - **progress**: task completion, stats, progress analysis and adaptation
//! - **tutor**: per-module AI tutoring
//! - **coach**: LEO career coaching
//! - **assessment**: assessment generation, grading and day unlocking
//! - **posts**: LinkedIn post generation
//! - **unipile**: LinkedIn account access through Unipile
//!
//! Every AI call goes through a fallback chain; a provider failure is logged
//! and the next link in the chain is tried.

use std::sync::Arc;

use tracing::warn;

use crate::llm::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};

pub mod assessment;
pub mod coach;
pub mod learning_plan;
pub mod parse;
pub mod posts;
pub mod profile;
pub mod progress;
pub mod roadmap;
pub mod tutor;
pub mod unipile;

pub use profile::ProfileService;
pub use unipile::UnipileClient;

/// Run one completion, treating an absent provider, an error or an empty
/// reply the same way: `None`, with a warning for the latter two.
pub(crate) async fn try_complete(
    backend: Option<&Arc<dyn LlmBackend>>,
    label: &str,
    request: CompletionRequest,
) -> Option<CompletionResponse> {
    let backend = backend?;
    match backend.complete(request).await {
        Ok(response) if !response.content.trim().is_empty() => Some(response),
        Ok(_) => {
            warn!("{} returned an empty reply", label);
            None
        }
        Err(e) => {
            warn!("{} request failed: {}", label, e);
            None
        }
    }
}

/// Like [`try_complete`] but keeps the error for callers that surface it
pub(crate) async fn complete_or_error(
    backend: Option<&Arc<dyn LlmBackend>>,
    label: &str,
    request: CompletionRequest,
) -> Result<CompletionResponse, LlmError> {
    let backend = backend.ok_or_else(|| LlmError::NotConfigured(label.to_string()))?;
    let response = backend.complete(request).await?;
    if response.content.trim().is_empty() {
        return Err(LlmError::ParseError(format!("{} returned an empty reply", label)));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockBackend;

    #[tokio::test]
    async fn test_try_complete_swallows_failures() {
        let mock = MockBackend::new("m");
        mock.push_error(LlmError::Unauthorized);
        let failing: Arc<dyn LlmBackend> = Arc::new(mock);
        assert!(try_complete(Some(&failing), "Groq", CompletionRequest::user("q")).await.is_none());
        assert!(try_complete(None, "Groq", CompletionRequest::user("q")).await.is_none());

        let empty: Arc<dyn LlmBackend> = Arc::new(MockBackend::new("m").with_response("  "));
        assert!(try_complete(Some(&empty), "Groq", CompletionRequest::user("q")).await.is_none());
    }

    #[tokio::test]
    async fn test_complete_or_error_reports_missing_provider() {
        let err = complete_or_error(None, "Bedrock", CompletionRequest::user("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(ref p) if p == "Bedrock"));
    }
}
