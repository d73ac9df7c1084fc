//! Health check endpoints
//!
//! - /health - liveness, 200 whenever the process is serving
//! - /ready - readiness, 200 only when MongoDB answers a ping
//! - /version - crate version and build metadata
//!
//! The server keeps running without MongoDB or Redis, so liveness never
//! depends on either.

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    /// "online" with a database, "degraded" without one
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub database: bool,
    pub cache: bool,
    /// Configured AI providers, by name
    pub providers: Vec<&'static str>,
    pub linkedin: bool,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub database: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub git_commit_full: &'static str,
    pub build_time: &'static str,
}

pub fn health_check(state: &AppState) -> Response<BoxBody> {
    let database = state.database_connected();
    let body = HealthResponse {
        healthy: true,
        status: if database { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        database,
        cache: state.cache.is_available(),
        providers: state.providers.names(),
        linkedin: state.unipile.is_configured(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &body)
}

pub async fn readiness_check(state: &AppState) -> Response<BoxBody> {
    let reachable = match &state.store {
        Some(store) => store.ping().await,
        None => false,
    };

    if reachable {
        json_response(
            StatusCode::OK,
            &ReadyResponse {
                ready: true,
                database: true,
                reason: None,
            },
        )
    } else {
        let reason = if state.store.is_some() {
            "Database ping failed"
        } else {
            "Database not connected"
        };
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &ReadyResponse {
                ready: false,
                database: false,
                reason: Some(reason.to_string()),
            },
        )
    }
}

pub fn version_info() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            git_commit: option_env!("IGNITE_GIT_COMMIT").unwrap_or("unknown"),
            git_commit_full: option_env!("IGNITE_GIT_COMMIT_FULL").unwrap_or("unknown"),
            build_time: option_env!("IGNITE_BUILD_TIME").unwrap_or("unknown"),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_is_ok() {
        let response = version_info();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
