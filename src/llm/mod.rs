//! AI provider layer
//!
//! Every provider implements [`LlmBackend`]:
//!
//! - [`OpenAiBackend`] for Groq (OpenAI-compatible chat completions)
//! - [`PerplexityBackend`] for search-augmented observation with citations
//! - [`BedrockBackend`] for Claude on AWS Bedrock
//! - [`CachedBackend`] wraps another backend with the Redis response cache
//! - [`MockBackend`] for tests

pub mod bedrock;
pub mod cached;
pub mod citations;
pub mod mock;
pub mod openai;
pub mod perplexity;
pub mod providers;
pub mod text;
pub mod traits;

pub use bedrock::BedrockBackend;
pub use cached::CachedBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use perplexity::PerplexityBackend;
pub use providers::Providers;
pub use traits::*;
