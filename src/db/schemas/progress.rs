//! Day unlock tracking schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for unlock progress
pub const PROGRESS_COLLECTION: &str = "progress_tracking";

/// Which days of a phase are unlocked and which assessments were passed
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProgressDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub phase_id: u32,

    #[serde(default)]
    pub unlocked_days: Vec<u32>,

    #[serde(default)]
    pub completed_assessments: Vec<u32>,

    /// What caused the last change ("initial", "assessment_passed", "corrected", "reset")
    #[serde(default)]
    pub unlock_trigger: String,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl IntoIndexes for ProgressDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "phase_id": 1 },
                Some(IndexOptions::builder().name("phase_id_index".to_string()).build()),
            ),
            (
                doc! { "updated_at": -1 },
                Some(IndexOptions::builder().name("updated_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for ProgressDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
