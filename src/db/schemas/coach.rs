//! LEO career coach conversation schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for career coach conversations
pub const COACH_SESSION_COLLECTION: &str = "career_coach_sessions";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CoachSessionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// `conv_<unix timestamp>`
    pub conversation_id: String,

    #[serde(default)]
    pub messages: Vec<CoachMessage>,

    #[serde(default)]
    pub created_at: Option<DateTime>,
}

/// One prompt/response exchange
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CoachMessage {
    pub prompt: String,
    pub response: String,
    pub time: chrono::DateTime<Utc>,
}

impl CoachSessionDoc {
    pub fn new(user_id: &str) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id: user_id.to_string(),
            conversation_id: format!("conv_{}", Utc::now().timestamp()),
            messages: Vec::new(),
            created_at: Some(DateTime::now()),
        }
    }

    /// Messages ordered oldest first
    pub fn sorted_messages(&self) -> Vec<CoachMessage> {
        let mut messages = self.messages.clone();
        messages.sort_by_key(|m| m.time);
        messages
    }
}

impl IntoIndexes for CoachSessionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "created_at": -1 },
                Some(IndexOptions::builder().name("created_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for CoachSessionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
