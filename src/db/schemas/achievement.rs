//! Achievement schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for achievements
pub const ACHIEVEMENT_COLLECTION: &str = "achievements";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AchievementDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// e.g. "linkedin_post", "assessment_shared"
    pub achievement_type: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default)]
    pub earned_at: Option<DateTime>,
}

impl AchievementDoc {
    pub fn new(
        user_id: &str,
        achievement_type: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id: user_id.to_string(),
            achievement_type: achievement_type.to_string(),
            title: title.into(),
            description: description.into(),
            data,
            earned_at: Some(DateTime::now()),
        }
    }
}

impl IntoIndexes for AchievementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "achievement_type": 1 },
                Some(IndexOptions::builder().name("achievement_type_index".to_string()).build()),
            ),
            (
                doc! { "earned_at": -1 },
                Some(IndexOptions::builder().name("earned_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for AchievementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
