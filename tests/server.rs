//! End-to-end HTTP tests against a server with no MongoDB or Redis

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use ignite::cache::{CacheTimeouts, ResponseCache};
use ignite::config::Args;
use ignite::llm::Providers;
use ignite::server::{self, AppState};

struct TestServer {
    addr: SocketAddr,
    token: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(extra: &[&str]) -> Self {
        let mut argv = vec!["ignite", "--dev-mode", "--secret-key", "", "--listen", "127.0.0.1:0"];
        argv.extend_from_slice(extra);
        let args = Args::parse_from(argv);

        let cache = Arc::new(ResponseCache::disabled(CacheTimeouts::default()));
        let state = AppState::new(args, None, cache, Providers::default()).unwrap();
        let token = state
            .jwt
            .as_ref()
            .unwrap()
            .generate_token("user-1", "learner@example.com")
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server::serve(listener, Arc::new(state)));

        Self {
            addr,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        read(response).await
    }

    async fn get_authed(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .unwrap();
        read(response).await
    }

    async fn post_authed(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .unwrap();
        read(response).await
    }
}

async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let text = response.text().await.unwrap();
    let body = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let server = TestServer::start(&[]).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
    assert_eq!(body["cache"], false);
}

#[tokio::test]
async fn ready_is_unavailable_without_database() {
    let server = TestServer::start(&[]).await;
    let (status, body) = server.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn version_reports_crate_version() {
    let server = TestServer::start(&[]).await;
    let (status, body) = server.get("/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn api_routes_require_a_token() {
    let server = TestServer::start(&[]).await;

    let (status, body) = server.get("/api/roadmap").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = server
        .client
        .get(server.url("/social/achievements"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn database_routes_answer_503_without_mongo() {
    let server = TestServer::start(&[]).await;

    let (status, body) = server.get_authed("/api/roadmap").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "DB_UNAVAILABLE");
    assert_eq!(body["error"], "Database not available");

    let (status, body) = server
        .post_authed("/api/coach/chat", json!({ "message": "How do I start?" }))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "DB_UNAVAILABLE");

    let (status, body) = server
        .post_authed(
            "/api/assessment/check-existing",
            json!({ "phase_id": 0, "week_index": 0, "task_index": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "DB_UNAVAILABLE");
}

#[tokio::test]
async fn register_validates_before_touching_the_database() {
    let server = TestServer::start(&[]).await;

    let response = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "password": "short" }))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WEAK_PASSWORD");

    let response = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "password": "long-enough-pw" }))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "DB_UNAVAILABLE");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let server = TestServer::start(&[]).await;
    let response = server
        .client
        .post(server.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preflight_is_answered_for_any_path() {
    let server = TestServer::start(&[]).await;
    let response = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/api/tutor/chat"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn unknown_paths_are_404() {
    let server = TestServer::start(&[]).await;
    let (status, _) = server.get("/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.get_authed("/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_is_405() {
    let server = TestServer::start(&[]).await;
    let (status, _) = server.get_authed("/api/coach/chat").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn cache_stats_work_without_redis() {
    let server = TestServer::start(&[]).await;
    let (status, body) = server.get_authed("/api/cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
}

#[tokio::test]
async fn cache_clearing_requires_debug() {
    let server = TestServer::start(&[]).await;
    let (status, body) = server.post_authed("/api/cache/clear/api", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let server = TestServer::start(&["--debug"]).await;
    let (status, body) = server.post_authed("/api/cache/clear/api", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 0);
}
