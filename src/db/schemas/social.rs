//! Social post schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for generated and published posts
pub const SOCIAL_POST_COLLECTION: &str = "social_posts";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SocialPostDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub post_content: String,

    /// milestone, project, skill, assessment or achievement
    pub post_type: String,

    #[serde(default)]
    pub status: PostStatus,

    /// Generation inputs (milestone text, project name, score, ...)
    #[serde(default)]
    pub details: serde_json::Value,

    #[serde(default)]
    pub post_id: Option<String>,

    #[serde(default)]
    pub post_url: Option<String>,

    #[serde(default)]
    pub posted_at: Option<DateTime>,

    #[serde(default)]
    pub created_at: Option<DateTime>,
}

impl IntoIndexes for SocialPostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "posted_at": -1 },
                Some(IndexOptions::builder().name("posted_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for SocialPostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
