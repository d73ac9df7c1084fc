//! MongoDB client and typed collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{
    options::{FindOptions, IndexOptions, UpdateModifications, UpdateOptions},
    results::UpdateResult,
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::IgniteError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Append driver timeouts to a connection string.
///
/// The driver requires a `/` between the host list and the options.
pub fn with_timeouts(uri: &str, timeout_ms: u64) -> String {
    let options = format!(
        "serverSelectionTimeoutMS={}&connectTimeoutMS={}",
        timeout_ms, timeout_ms
    );
    if uri.contains('?') {
        return format!("{}&{}", uri, options);
    }
    let after_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    if after_scheme.contains('/') {
        format!("{}?{}", uri, options)
    } else {
        format!("{}/?{}", uri, options)
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client and verify it with a ping
    pub async fn connect(uri: &str, db_name: &str, timeout_ms: u64) -> Result<Self, IgniteError> {
        info!("Connecting to MongoDB database '{}'", db_name);

        let client = Client::with_uri_str(&with_timeouts(uri, timeout_ms))
            .await
            .map_err(|e| IgniteError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let mongo = Self {
            client,
            db_name: db_name.to_string(),
        };
        mongo.ping().await?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(mongo)
    }

    /// Round-trip a ping command
    pub async fn ping(&self) -> Result<(), IgniteError> {
        self.database()
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| IgniteError::Database(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, IgniteError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database handle
    pub fn database(&self) -> Database {
        self.client.database(&self.db_name)
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, IgniteError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    pub async fn apply_indexes(&self) -> Result<usize, IgniteError> {
        let indices = index_models::<T>();
        if indices.is_empty() {
            return Ok(0);
        }
        let count = indices.len();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| IgniteError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(count)
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, IgniteError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| IgniteError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| IgniteError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, IgniteError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| IgniteError::Database(format!("Find failed: {}", e)))
    }

    /// Find the newest document matching the filter, ordered by `sort_field`
    pub async fn find_latest(
        &self,
        filter: Document,
        sort_field: &str,
    ) -> Result<Option<T>, IgniteError> {
        let mut found = self.find_sorted(filter, doc! { sort_field: -1 }, Some(1)).await?;
        Ok(found.pop())
    }

    /// Find documents with a sort order and an optional limit
    pub async fn find_sorted(
        &self,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
    ) -> Result<Vec<T>, IgniteError> {
        let options = FindOptions::builder().sort(sort).limit(limit).build();

        let cursor = self
            .inner
            .find(live(filter))
            .with_options(options)
            .await
            .map_err(|e| IgniteError::Database(format!("Find failed: {}", e)))?;

        Ok(collect_cursor(cursor).await)
    }

    /// Update one document, stamping `metadata.updated_at` on `$set` updates
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, IgniteError> {
        self.inner
            .update_one(filter, stamp_updated(update.into()))
            .await
            .map_err(|e| IgniteError::Database(format!("Update failed: {}", e)))
    }

    /// Update one document, inserting it when nothing matches
    pub async fn upsert_one(&self, filter: Document, set: Document) -> Result<UpdateResult, IgniteError> {
        let now = DateTime::now();
        let mut set = set;
        set.insert("metadata.updated_at", now);
        let update = doc! {
            "$set": set,
            "$setOnInsert": {
                "metadata.is_deleted": false,
                "metadata.created_at": now,
            }
        };

        self.inner
            .update_one(filter, update)
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|e| IgniteError::Database(format!("Upsert failed: {}", e)))
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

/// Build the index models a schema declares
pub fn index_models<T: IntoIndexes>() -> Vec<IndexModel> {
    T::into_indices()
        .into_iter()
        .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
        .collect()
}

/// Restrict a filter to documents that are not soft-deleted
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

fn stamp_updated(update: UpdateModifications) -> UpdateModifications {
    match update {
        UpdateModifications::Document(mut update) => {
            if let Ok(set) = update.get_document_mut("$set") {
                set.insert("metadata.updated_at", DateTime::now());
            }
            UpdateModifications::Document(update)
        }
        other => other,
    }
}

async fn collect_cursor<T>(cursor: mongodb::Cursor<T>) -> Vec<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    cursor
        .filter_map(|doc| async {
            match doc {
                Ok(d) => Some(d),
                Err(e) => {
                    error!("Error reading document: {}", e);
                    None
                }
            }
        })
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_timeouts_adds_options() {
        assert_eq!(
            with_timeouts("mongodb://localhost:27017/", 3000),
            "mongodb://localhost:27017/?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000"
        );
        assert_eq!(
            with_timeouts("mongodb://localhost:27017", 5000),
            "mongodb://localhost:27017/?serverSelectionTimeoutMS=5000&connectTimeoutMS=5000"
        );
        assert_eq!(
            with_timeouts("mongodb+srv://u:p@cluster.example.net/db?retryWrites=true", 3000),
            "mongodb+srv://u:p@cluster.example.net/db?retryWrites=true&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000"
        );
    }

    #[test]
    fn test_live_filter_excludes_deleted() {
        let filter = live(doc! { "user_id": "u1" });
        assert_eq!(filter.get_str("user_id").unwrap(), "u1");
        assert!(filter.get_document("metadata.is_deleted").is_ok());
    }

    #[test]
    fn test_stamp_updated_only_touches_set() {
        let stamped = stamp_updated(UpdateModifications::Document(doc! { "$set": { "a": 1 } }));
        match stamped {
            UpdateModifications::Document(d) => {
                assert!(d.get_document("$set").unwrap().contains_key("metadata.updated_at"));
            }
            _ => panic!("expected document update"),
        }

        let untouched = stamp_updated(UpdateModifications::Document(doc! { "$push": { "a": 1 } }));
        match untouched {
            UpdateModifications::Document(d) => assert!(!d.contains_key("$set")),
            _ => panic!("expected document update"),
        }
    }
}
