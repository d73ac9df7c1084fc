//! HTTP routes for PBSC Ignite
//!
//! Each prefix group exposes a `handle_*_request` function returning
//! `Some(response)` when it owns the path and `None` otherwise. Groups under
//! `/api` and `/social` receive the already-authenticated [`AuthUser`].

pub mod assessment;
pub mod auth;
pub mod cache;
pub mod coach;
pub mod health;
pub mod linkedin;
pub mod profile;
pub mod roadmap;
pub mod social;
pub mod tutor;

pub use assessment::handle_assessment_request;
pub use auth::handle_auth_request;
pub use cache::handle_cache_request;
pub use coach::handle_coach_request;
pub use health::{health_check, readiness_check, version_info};
pub use linkedin::handle_linkedin_request;
pub use profile::handle_profile_request;
pub use roadmap::handle_roadmap_request;
pub use social::handle_social_request;
pub use tutor::handle_tutor_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::auth::extract_token_from_header;
use crate::db::Store;
use crate::server::AppState;
use crate::types::IgniteError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Identity taken from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

fn with_cors(response: &mut Response<BoxBody>) {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(&mut response);
    response
}

pub fn ok_json<T: Serialize>(body: &T) -> Response<BoxBody> {
    json_response(StatusCode::OK, body)
}

pub fn error_json(status: StatusCode, error: impl Into<String>, code: Option<&str>) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.into(),
            code: code.map(str::to_string),
        },
    )
}

/// Render a service error; server-side failures are logged and reported generically
pub fn error_response(err: IgniteError) -> Response<BoxBody> {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    error_json(status, err.public_message(), Some(err.code()))
}

pub fn not_found(path: &str) -> Response<BoxBody> {
    error_json(StatusCode::NOT_FOUND, format!("No route for {}", path), Some("NOT_FOUND"))
}

pub fn method_not_allowed() -> Response<BoxBody> {
    error_json(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
}

pub fn cors_preflight() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    with_cors(&mut response);
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Read and decode a JSON body of at most [`MAX_BODY_BYTES`]
pub async fn parse_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, IgniteError> {
    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| IgniteError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();

    if bytes.is_empty() {
        return serde_json::from_slice(b"{}")
            .map_err(|e| IgniteError::BadRequest(format!("Invalid JSON: {}", e)));
    }
    serde_json::from_slice(&bytes).map_err(|e| IgniteError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Decode the query string into `T`
pub fn parse_query<T: DeserializeOwned>(req: &Request<Incoming>) -> Result<T, IgniteError> {
    serde_urlencoded::from_str(req.uri().query().unwrap_or(""))
        .map_err(|e| IgniteError::BadRequest(format!("Invalid query: {}", e)))
}

pub fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// Verify the bearer token on a request
pub fn authenticate(req: &Request<Incoming>, state: &AppState) -> Result<AuthUser, Response<BoxBody>> {
    let token = extract_token_from_header(get_auth_header(req))
        .ok_or_else(|| error_json(StatusCode::UNAUTHORIZED, "Authentication required", Some("UNAUTHORIZED")))?;

    let jwt = state.jwt.as_ref().ok_or_else(|| {
        error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token signing is not configured",
            Some("CONFIG_ERROR"),
        )
    })?;

    let result = jwt.verify_token(token);
    match result.claims {
        Some(claims) if result.valid => Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
        }),
        _ => {
            let reason = result.error.unwrap_or_else(|| "Invalid or expired token".into());
            warn!("Rejected token: {}", reason);
            Err(error_json(StatusCode::UNAUTHORIZED, reason, Some("UNAUTHORIZED")))
        }
    }
}

/// The database handle, or a 503 when MongoDB is not connected
pub fn require_store(state: &AppState) -> Result<&Store, Response<BoxBody>> {
    state.store.as_ref().ok_or_else(|| {
        error_json(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database not available",
            Some("DB_UNAVAILABLE"),
        )
    })
}

/// Unwrap a `Result<_, Response>` inside a handler returning `Response`
#[macro_export]
macro_rules! try_response {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}

/// Unwrap a service `Result`, rendering the error as the response
#[macro_export]
macro_rules! try_service {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => return $crate::routes::error_response(err),
        }
    };
}

/// Parse a numeric path segment
pub fn path_param<T: std::str::FromStr>(segment: &str, name: &str) -> Result<T, IgniteError> {
    segment
        .parse()
        .map_err(|_| IgniteError::BadRequest(format!("Invalid {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response_carries_cors() {
        let response = json_response(StatusCode::CREATED, &serde_json::json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_error_response_uses_public_message() {
        let response = error_response(IgniteError::Database("mongodb://secret".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = error_response(IgniteError::Conflict("Email already registered".into()));
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_preflight() {
        let response = cors_preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn test_path_param() {
        assert_eq!(path_param::<u32>("3", "phase_id").unwrap(), 3);
        assert!(path_param::<u32>("x", "phase_id").is_err());
    }
}
