//! Tutor chat history schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for tutor conversations
pub const CHAT_HISTORY_COLLECTION: &str = "chat_history";

/// Tutor conversation for one user and one learning module
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChatHistoryDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// `phase_{phase}_module_{module}`
    pub session_id: String,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Time of the latest exchange
    #[serde(default)]
    pub timestamp: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
    pub timestamp: chrono::DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            timestamp: Utc::now(),
            citations: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            timestamp: Utc::now(),
            citations,
        }
    }
}

/// Session key for a tutor conversation
pub fn session_id(phase_id: u32, module_id: u32) -> String {
    format!("phase_{}_module_{}", phase_id, module_id)
}

impl IntoIndexes for ChatHistoryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "session_id": 1 },
                Some(IndexOptions::builder().name("session_id_index".to_string()).build()),
            ),
            (
                doc! { "timestamp": -1 },
                Some(IndexOptions::builder().name("timestamp_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for ChatHistoryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
