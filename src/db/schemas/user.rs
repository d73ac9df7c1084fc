//! User document schema
//!
//! Stores credentials and the career profile used to personalize prompts.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Stable user identifier (uuid v4) carried in tokens
    pub user_id: String,

    pub name: String,

    /// Lowercased email address
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub career_goal: Option<String>,

    #[serde(default)]
    pub linkedin_url: Option<String>,

    #[serde(default)]
    pub github_username: Option<String>,

    #[serde(default)]
    pub skills: Vec<String>,

    #[serde(default)]
    pub headline: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

/// Public view of a user (never includes the password hash)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub career_goal: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_username: Option<String>,
    pub skills: Vec<String>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(user_id: String, name: String, email: String, password_hash: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            name,
            email,
            password_hash,
            ..Default::default()
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            career_goal: self.career_goal.clone(),
            linkedin_url: self.linkedin_url.clone(),
            github_username: self.github_username.clone(),
            skills: self.skills.clone(),
            headline: self.headline.clone(),
            summary: self.summary.clone(),
            location: self.location.clone(),
        }
    }
}

impl IntoIndexes for UserDoc {
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
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
