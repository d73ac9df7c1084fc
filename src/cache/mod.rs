//! Optional Redis response cache
//!
//! Caches profile summaries, roadmaps and AI provider responses. The cache is
//! strictly an optimization: when Redis is missing the application behaves
//! the same, only slower.

pub mod keys;
pub mod redis;

use serde::Serialize;

use crate::config::RedisArgs;

pub use self::keys::{cache_key, content_hash, CachePrefix};
pub use self::redis::ResponseCache;

/// TTL classes configured through CACHE_TIMEOUT_*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Short,
    Medium,
    Long,
    Api,
}

/// TTLs in seconds for each class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTimeouts {
    pub short: u64,
    pub medium: u64,
    pub long: u64,
    pub api: u64,
}

impl Default for CacheTimeouts {
    fn default() -> Self {
        Self {
            short: 300,
            medium: 1800,
            long: 21600,
            api: 43200,
        }
    }
}

impl CacheTimeouts {
    pub fn from_args(args: &RedisArgs) -> Self {
        Self {
            short: args.cache_timeout_short,
            medium: args.cache_timeout_medium,
            long: args.cache_timeout_long,
            api: args.cache_timeout_api,
        }
    }

    pub fn seconds(&self, class: TimeoutClass) -> u64 {
        match class {
            TimeoutClass::Short => self.short,
            TimeoutClass::Medium => self.medium,
            TimeoutClass::Long => self.long,
            TimeoutClass::Api => self.api,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub status: String,
    pub used_memory: String,
    pub total_keys: u64,
    pub connected_clients: u64,
}

impl CacheStats {
    pub fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            used_memory: "0B".to_string(),
            total_keys: 0,
            connected_clients: 0,
        }
    }
}

/// Number of cached keys per kind
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TypeCounts {
    pub profiles: u64,
    pub api_responses: u64,
    pub sessions: u64,
    pub roadmaps: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub enabled: bool,
    pub stats: CacheStats,
    pub counts: TypeCounts,
}
