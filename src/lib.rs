//! PBSC Ignite - AI learning roadmaps, tutoring and career coaching
//!
//! An HTTP API that stores learners in MongoDB, caches AI responses in Redis
//! when available, and drives Groq, Perplexity and AWS Bedrock for content.
//! LinkedIn sharing goes through Unipile.
//!
//! ## Services
//!
//! - **Roadmaps**: four-phase career roadmaps with weekly learning plans
//! - **Progress**: task completion, delay detection and adaptive plans
//! - **Tutor**: per-module AI tutoring with references
//! - **LEO**: career coaching conversations
//! - **Assessments**: daily theory and coding assessments with day unlocking
//! - **Social**: LinkedIn post generation and publishing

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod llm;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{IgniteError, Result};
