//! LinkedIn connection and sharing preferences schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for LinkedIn connections
pub const LINKEDIN_PROFILE_COLLECTION: &str = "linkedin_profiles";

/// LinkedIn connection state for one user
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LinkedInProfileDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// Unipile account id
    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub profile_url: Option<String>,

    /// "connected" or "disconnected"
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub auto_sharing: bool,

    #[serde(default)]
    pub share_preferences: SharePreferences,

    /// Last profile fetched through Unipile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<LinkedInProfile>,

    #[serde(default)]
    pub connected_at: Option<DateTime>,

    #[serde(default)]
    pub fetched_at: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SharePreferences {
    #[serde(default = "default_true")]
    pub share_assessments: bool,
    #[serde(default = "default_true")]
    pub share_milestones: bool,
    #[serde(default = "default_true")]
    pub share_projects: bool,
}

impl Default for SharePreferences {
    fn default() -> Self {
        Self {
            share_assessments: true,
            share_milestones: true,
            share_projects: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// LinkedIn profile as parsed from a Unipile profile response
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkedInProfile {
    pub name: String,
    pub headline: String,
    pub location: String,
    pub summary: String,
    #[serde(default)]
    pub experience: Vec<serde_json::Value>,
    #[serde(default)]
    pub education: Vec<serde_json::Value>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<serde_json::Value>,
    pub profile_url: String,
    pub profile_picture: String,
    pub connections_count: u64,
    pub fetched_at: chrono::DateTime<Utc>,
}

impl LinkedInProfileDoc {
    pub fn is_connected(&self) -> bool {
        self.status == "connected" && self.account_id.as_deref().is_some_and(|a| !a.is_empty())
    }
}

impl IntoIndexes for LinkedInProfileDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "fetched_at": -1 },
                Some(IndexOptions::builder().name("fetched_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for LinkedInProfileDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
