//! Database initialization, health check and reset
//!
//! Used by the `ignite-db` binary. Everything here is idempotent except
//! `drop_database`.

use bson::{doc, Bson, Document};
use chrono::Utc;
use mongodb::options::ReplaceOptions;
use tracing::info;

use crate::db::mongo::{index_models, IntoIndexes, MongoClient};
use crate::db::schemas::{
    AchievementDoc, AssessmentDoc, ChatHistoryDoc, CoachSessionDoc, LinkedInProfileDoc,
    ProgressDoc, ResourceDoc, RoadmapDoc, SocialPostDoc, UserDoc, ACHIEVEMENT_COLLECTION,
    ASSESSMENT_COLLECTION, CHAT_HISTORY_COLLECTION, COACH_SESSION_COLLECTION, CONFIG_COLLECTION,
    DATA_COLLECTIONS, LINKEDIN_PROFILE_COLLECTION, PROGRESS_COLLECTION, RESOURCE_COLLECTION,
    ROADMAP_COLLECTION, SOCIAL_POST_COLLECTION, USER_COLLECTION,
};
use crate::types::{IgniteError, Result};

/// Version recorded in the `system_config` document
pub const SCHEMA_VERSION: &str = "2.11";

/// `_id` of the configuration document
pub const SYSTEM_CONFIG_ID: &str = "system_config";

/// Feature list recorded in the `system_config` document
pub const FEATURES: [&str; 6] = [
    "Personalized Learning Roadmaps",
    "AI Tutoring (LEO)",
    "Career Coaching",
    "Integrated Assessments",
    "LinkedIn Integration",
    "Progress Tracking",
];

/// Outcome of `initialize`
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub indexes: usize,
    pub stats: DbStats,
}

/// Subset of the `dbstats` command output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbStats {
    pub collections: i64,
    pub data_size_kb: f64,
    pub storage_size_kb: f64,
}

/// Outcome of `check`
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Collection name and document count, sorted by name
    pub collections: Vec<(String, u64)>,
    pub initialized_at: Option<String>,
    pub version: Option<String>,
}

impl CheckReport {
    pub fn is_initialized(&self) -> bool {
        self.initialized_at.is_some()
    }
}

/// Create missing collections, apply indexes and record the system configuration
pub async fn initialize(mongo: &MongoClient) -> Result<InitReport> {
    let db = mongo.database();
    let mut report = InitReport::default();

    let existing = db.list_collection_names().await?;
    for name in DATA_COLLECTIONS {
        if existing.iter().any(|c| c == name) {
            report.existing.push(name.to_string());
        } else {
            db.create_collection(name).await?;
            info!("Created collection '{}'", name);
            report.created.push(name.to_string());
        }
    }

    report.indexes += apply::<UserDoc>(mongo, USER_COLLECTION).await?;
    report.indexes += apply::<RoadmapDoc>(mongo, ROADMAP_COLLECTION).await?;
    report.indexes += apply::<AssessmentDoc>(mongo, ASSESSMENT_COLLECTION).await?;
    report.indexes += apply::<ChatHistoryDoc>(mongo, CHAT_HISTORY_COLLECTION).await?;
    report.indexes += apply::<CoachSessionDoc>(mongo, COACH_SESSION_COLLECTION).await?;
    report.indexes += apply::<LinkedInProfileDoc>(mongo, LINKEDIN_PROFILE_COLLECTION).await?;
    report.indexes += apply::<ProgressDoc>(mongo, PROGRESS_COLLECTION).await?;
    report.indexes += apply::<ResourceDoc>(mongo, RESOURCE_COLLECTION).await?;
    report.indexes += apply::<SocialPostDoc>(mongo, SOCIAL_POST_COLLECTION).await?;
    report.indexes += apply::<AchievementDoc>(mongo, ACHIEVEMENT_COLLECTION).await?;

    let config = system_config(mongo.db_name());
    db.collection::<Document>(CONFIG_COLLECTION)
        .replace_one(doc! { "_id": SYSTEM_CONFIG_ID }, config)
        .with_options(ReplaceOptions::builder().upsert(true).build())
        .await?;
    info!("System configuration saved");

    let stats = db.run_command(doc! { "dbstats": 1 }).await?;
    report.stats = parse_db_stats(&stats);

    Ok(report)
}

/// List collections with document counts and read the system configuration
pub async fn check(mongo: &MongoClient) -> Result<CheckReport> {
    let db = mongo.database();
    let mut names = db.list_collection_names().await?;
    names.sort();

    let mut report = CheckReport::default();
    for name in names {
        let count = db
            .collection::<Document>(&name)
            .estimated_document_count()
            .await?;
        report.collections.push((name, count));
    }

    let config = db
        .collection::<Document>(CONFIG_COLLECTION)
        .find_one(doc! { "_id": SYSTEM_CONFIG_ID })
        .await?;
    if let Some(config) = config {
        report.initialized_at = config.get_str("initialized_at").ok().map(str::to_string);
        report.version = config.get_str("version").ok().map(str::to_string);
    }

    Ok(report)
}

/// Drop the whole database
pub async fn drop_database(mongo: &MongoClient) -> Result<()> {
    mongo
        .database()
        .drop()
        .await
        .map_err(|e| IgniteError::Database(format!("Failed to drop database: {}", e)))?;
    info!("Dropped database '{}'", mongo.db_name());
    Ok(())
}

/// The operator must type exactly `DELETE <db_name>` to confirm a reset
pub fn confirms_reset(input: &str, db_name: &str) -> bool {
    input.trim_end_matches(['\r', '\n']) == format!("DELETE {}", db_name)
}

fn system_config(db_name: &str) -> Document {
    doc! {
        "_id": SYSTEM_CONFIG_ID,
        "initialized_at": Utc::now().to_rfc3339(),
        "version": SCHEMA_VERSION,
        "database_name": db_name,
        "collections_count": DATA_COLLECTIONS.len() as i32,
        "features": FEATURES.to_vec(),
    }
}

async fn apply<T: IntoIndexes>(mongo: &MongoClient, name: &str) -> Result<usize> {
    let models = index_models::<T>();
    if models.is_empty() {
        return Ok(0);
    }
    let count = models.len();
    mongo
        .database()
        .collection::<Document>(name)
        .create_indexes(models)
        .await
        .map_err(|e| IgniteError::Database(format!("Failed to create indexes on {}: {}", name, e)))?;
    info!("Indexes ready on '{}' ({})", name, count);
    Ok(count)
}

fn parse_db_stats(stats: &Document) -> DbStats {
    DbStats {
        collections: number(stats, "collections") as i64,
        data_size_kb: number(stats, "dataSize") / 1024.0,
        storage_size_kb: number(stats, "storageSize") / 1024.0,
    }
}

fn number(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(Bson::Int32(n)) => *n as f64,
        Some(Bson::Int64(n)) => *n as f64,
        Some(Bson::Double(n)) => *n,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirms_reset_requires_exact_phrase() {
        assert!(confirms_reset("DELETE PBSC-Ignite-db\n", "PBSC-Ignite-db"));
        assert!(!confirms_reset("delete PBSC-Ignite-db", "PBSC-Ignite-db"));
        assert!(!confirms_reset("DELETE other", "PBSC-Ignite-db"));
        assert!(!confirms_reset("", "PBSC-Ignite-db"));
    }

    #[test]
    fn test_system_config_document() {
        let config = system_config("test-db");
        assert_eq!(config.get_str("_id").unwrap(), "system_config");
        assert_eq!(config.get_str("version").unwrap(), "2.11");
        assert_eq!(config.get_i32("collections_count").unwrap(), 10);
        assert_eq!(config.get_array("features").unwrap().len(), 6);
    }

    #[test]
    fn test_parse_db_stats_accepts_mixed_number_types() {
        let stats = doc! { "collections": 10, "dataSize": 2048.0_f64, "storageSize": 4096_i64 };
        assert_eq!(
            parse_db_stats(&stats),
            DbStats {
                collections: 10,
                data_size_kb: 2.0,
                storage_size_kb: 4.0
            }
        );
    }

    #[test]
    fn test_every_data_collection_declares_indexes_except_resources() {
        assert_eq!(index_models::<UserDoc>().len(), 2);
        assert_eq!(index_models::<AssessmentDoc>().len(), 3);
        assert_eq!(index_models::<LinkedInProfileDoc>().len(), 2);
        assert!(index_models::<ResourceDoc>().is_empty());
    }
}
