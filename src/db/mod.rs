//! MongoDB persistence
//!
//! Typed collections over the official driver, the document schemas, and the
//! initialization routines behind `ignite-db`.

pub mod init;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use store::Store;
