//! Assessment submission schema

use std::collections::BTreeMap;

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for assessment submissions
pub const ASSESSMENT_COLLECTION: &str = "assessments";

/// One submitted assessment attempt
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AssessmentDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// Zero-based phase index
    pub phase_id: u32,

    /// One-based day within the phase
    pub day: u32,

    /// "theory" or "coding"
    pub assessment_type: String,

    #[serde(default)]
    pub answers: BTreeMap<String, String>,

    pub evaluation: Evaluation,

    pub score: u32,

    pub passed: bool,

    pub attempt: u32,

    #[serde(default)]
    pub submitted_at: Option<DateTime>,
}

/// Result of grading a submission
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub score: u32,
    pub passed: bool,
    pub status: String,
    pub feedback: String,
    #[serde(default)]
    pub feedback_points: Vec<String>,
    pub next_steps: String,
}

impl IntoIndexes for AssessmentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "assessment_type": 1 },
                Some(IndexOptions::builder().name("assessment_type_index".to_string()).build()),
            ),
            (
                doc! { "submitted_at": -1 },
                Some(IndexOptions::builder().name("submitted_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for AssessmentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
