//! Redis-backed response cache
//!
//! Every operation degrades to a no-op when Redis is disabled or unreachable:
//! reads miss, writes report `false`, pattern deletes report zero.

use std::time::Duration;

use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::keys::{api_patterns, user_patterns, KEY_NAMESPACE};
use crate::cache::{CacheHealth, CacheStats, CacheTimeouts, TimeoutClass, TypeCounts};
use crate::config::RedisArgs;

/// How long startup waits for Redis before continuing without it
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// SCAN batch size used by pattern operations
const SCAN_COUNT: usize = 200;

/// Optional Redis response cache
pub struct ResponseCache {
    pool: Option<Pool>,
    timeouts: CacheTimeouts,
}

impl ResponseCache {
    /// Connect to Redis, falling back to a bypassed cache on any failure
    pub async fn connect(args: &RedisArgs) -> Self {
        let timeouts = CacheTimeouts::from_args(args);
        if !args.cache_enabled {
            info!("Response cache disabled by configuration");
            return Self::disabled(timeouts);
        }

        let pool = match Config::from_url(args.url()).create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to create Redis pool, caching disabled: {}", e);
                return Self::disabled(timeouts);
            }
        };

        let probe = async {
            let mut conn = pool.get().await.map_err(|e| e.to_string())?;
            let pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(pong)
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, probe).await {
            Ok(Ok(_)) => {
                info!("Redis connected at {}", args.display_addr());
                Self {
                    pool: Some(pool),
                    timeouts,
                }
            }
            Ok(Err(e)) => {
                warn!("Redis unavailable, caching disabled: {}", e);
                Self::disabled(timeouts)
            }
            Err(_) => {
                warn!("Redis connection timed out, caching disabled");
                Self::disabled(timeouts)
            }
        }
    }

    /// A cache that bypasses every operation
    pub fn disabled(timeouts: CacheTimeouts) -> Self {
        Self {
            pool: None,
            timeouts,
        }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub fn timeouts(&self) -> &CacheTimeouts {
        &self.timeouts
    }

    async fn conn(&self) -> Option<Connection> {
        let pool = self.pool.as_ref()?;
        match pool.get().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Redis connection unavailable: {}", e);
                None
            }
        }
    }

    /// Read and decode a cached JSON value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache get failed for {}: {}", key, e);
                return None;
            }
        };

        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Store a JSON value with the TTL of the given class
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, class: TimeoutClass) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot encode cache entry {}: {}", key, e);
                return false;
            }
        };

        let ttl = self.timeouts.seconds(class);
        let result: redis::RedisResult<()> = conn.set_ex(key, payload, ttl).await;
        match result {
            Ok(()) => {
                debug!("Cache set: {} (ttl {}s)", key, ttl);
                true
            }
            Err(e) => {
                warn!("Cache set failed for {}: {}", key, e);
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let result: redis::RedisResult<u64> = conn.del(key).await;
        match result {
            Ok(removed) => removed > 0,
            Err(e) => {
                warn!("Cache delete failed for {}: {}", key, e);
                false
            }
        }
    }

    /// Delete every key matching a glob pattern; returns how many were removed
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let Some(mut conn) = self.conn().await else {
            return 0;
        };
        let keys = match scan_keys(&mut conn, pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cache scan failed for {}: {}", pattern, e);
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }

        let result: redis::RedisResult<u64> = conn.del(&keys).await;
        match result {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cache delete failed for {}: {}", pattern, e);
                0
            }
        }
    }

    /// Count keys matching a glob pattern
    pub async fn count_pattern(&self, pattern: &str) -> u64 {
        let Some(mut conn) = self.conn().await else {
            return 0;
        };
        match scan_keys(&mut conn, pattern).await {
            Ok(keys) => keys.len() as u64,
            Err(e) => {
                warn!("Cache scan failed for {}: {}", pattern, e);
                0
            }
        }
    }

    /// Server statistics, or a "disabled" record when Redis is not in use
    pub async fn stats(&self) -> CacheStats {
        let Some(mut conn) = self.conn().await else {
            return CacheStats::disabled();
        };

        let memory: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .unwrap_or_default();
        let clients: String = redis::cmd("INFO")
            .arg("clients")
            .query_async(&mut conn)
            .await
            .unwrap_or_default();
        let total_keys: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .unwrap_or_default();

        CacheStats {
            status: "connected".to_string(),
            used_memory: info_field(&memory, "used_memory_human").unwrap_or_else(|| "unknown".into()),
            total_keys,
            connected_clients: info_field(&clients, "connected_clients")
                .and_then(|c| c.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Remove every cached entry belonging to a user
    pub async fn clear_user_cache(&self, user_id: &str) -> u64 {
        let mut removed = 0;
        for pattern in user_patterns(user_id) {
            removed += self.delete_pattern(&pattern).await;
        }
        if removed > 0 {
            info!("Cleared {} cache entries for user {}", removed, user_id);
        }
        removed
    }

    /// Remove every cached AI provider response
    pub async fn clear_api_cache(&self) -> u64 {
        let mut removed = 0;
        for pattern in api_patterns() {
            removed += self.delete_pattern(&pattern).await;
        }
        info!("Cleared {} cached API responses", removed);
        removed
    }

    /// Stats plus per-type key counts
    pub async fn health(&self) -> CacheHealth {
        let stats = self.stats().await;
        let counts = if self.is_available() {
            let ns = KEY_NAMESPACE;
            TypeCounts {
                profiles: self.count_pattern(&format!("{}:profile_*", ns)).await,
                api_responses: self.count_pattern(&format!("{}:perplexity:*", ns)).await
                    + self.count_pattern(&format!("{}:groq:*", ns)).await,
                sessions: self.count_pattern(&format!("{}:session:*", ns)).await,
                roadmaps: self.count_pattern(&format!("{}:roadmap:*", ns)).await,
            }
        } else {
            TypeCounts::default()
        };

        CacheHealth {
            enabled: self.is_available(),
            stats,
            counts,
        }
    }
}

async fn scan_keys(conn: &mut Connection, pattern: &str) -> redis::RedisResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;
        keys.extend(batch);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    keys.sort();
    keys.dedup();
    Ok(keys)
}

/// Read `field:value` from an INFO section
fn info_field(info: &str, field: &str) -> Option<String> {
    info.lines().find_map(|line| {
        line.strip_prefix(field)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(|value| value.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bypassed() -> ResponseCache {
        ResponseCache::disabled(CacheTimeouts::default())
    }

    #[tokio::test]
    async fn test_disabled_cache_bypasses_everything() {
        let cache = bypassed();
        assert!(!cache.is_available());
        assert!(cache.get::<String>("pbsc:roadmap:u1").await.is_none());
        assert!(!cache.set("pbsc:roadmap:u1", "value", TimeoutClass::Long).await);
        assert!(!cache.delete("pbsc:roadmap:u1").await);
        assert_eq!(cache.delete_pattern("pbsc:*").await, 0);
        assert_eq!(cache.clear_user_cache("u1").await, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_health() {
        let health = bypassed().health().await;
        assert!(!health.enabled);
        assert_eq!(health.stats.status, "disabled");
        assert_eq!(health.counts, TypeCounts::default());
    }

    #[test]
    fn test_info_field() {
        let info = "# Memory\r\nused_memory:1024\r\nused_memory_human:1.00K\r\n";
        assert_eq!(info_field(info, "used_memory_human").as_deref(), Some("1.00K"));
        assert_eq!(info_field(info, "used_memory").as_deref(), Some("1024"));
        assert_eq!(info_field(info, "missing"), None);
    }
}
