//! Shared types for PBSC Ignite

mod error;

pub use error::{IgniteError, Result};
