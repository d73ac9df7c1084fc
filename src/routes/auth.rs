//! Authentication routes
//!
//! - POST /auth/register - create an account and return a token
//! - POST /auth/login - exchange email and password for a token
//! - GET /auth/me - the profile behind a token

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, normalize_email, validate_password, verify_password, JwtValidator};
use crate::db::schemas::{UserDoc, UserProfile};
use crate::routes::{
    authenticate, error_json, error_response, json_response, method_not_allowed, parse_json_body,
    require_store, BoxBody,
};
use crate::server::AppState;
use crate::types::IgniteError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
    pub expires_in: u64,
    pub user: UserProfile,
}

/// Handle requests under `/auth/`
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let response = match (method, path) {
        (Method::POST, "/auth/register") => handle_register(req, state).await,
        (Method::POST, "/auth/login") => handle_login(req, state).await,
        (Method::GET, "/auth/me") => handle_me(req, state).await,
        (_, "/auth/register" | "/auth/login" | "/auth/me") => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

fn jwt(state: &AppState) -> Result<&JwtValidator, Response<BoxBody>> {
    state.jwt.as_ref().ok_or_else(|| {
        error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token signing is not configured",
            Some("CONFIG_ERROR"),
        )
    })
}

fn auth_response(jwt: &JwtValidator, user: &UserDoc, status: StatusCode) -> Response<BoxBody> {
    match jwt.generate_token(&user.user_id, &user.email) {
        Ok(token) => json_response(
            status,
            &AuthResponse {
                token,
                user_id: user.user_id.clone(),
                expires_in: jwt.expiry_seconds(),
                user: user.profile(),
            },
        ),
        Err(e) => error_response(e),
    }
}

fn is_duplicate_key(err: &IgniteError) -> bool {
    let message = err.to_string();
    message.contains("E11000") || message.contains("duplicate key")
}

/// POST /auth/register
async fn handle_register(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: RegisterRequest = crate::try_service!(parse_json_body(req).await);

    let name = body.name.trim();
    if name.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "Name is required", Some("BAD_REQUEST"));
    }
    let email = crate::try_service!(normalize_email(&body.email));
    if let Err(e) = validate_password(&body.password) {
        return error_json(StatusCode::BAD_REQUEST, e.public_message(), Some("WEAK_PASSWORD"));
    }

    let jwt = crate::try_response!(jwt(&state));
    let store = crate::try_response!(require_store(&state));

    match store.users.find_one(doc! { "email": &email }).await {
        Ok(Some(_)) => {
            return error_json(
                StatusCode::CONFLICT,
                "An account with this email already exists",
                Some("USER_EXISTS"),
            )
        }
        Ok(None) => {}
        Err(e) => return error_response(e),
    }

    let password_hash = crate::try_service!(hash_password(&body.password));
    let user = UserDoc::new(
        uuid::Uuid::new_v4().to_string(),
        name.to_string(),
        email,
        password_hash,
    );

    if let Err(e) = store.users.insert_one(user.clone()).await {
        // Lost a race with a concurrent registration
        if is_duplicate_key(&e) {
            return error_json(
                StatusCode::CONFLICT,
                "An account with this email already exists",
                Some("USER_EXISTS"),
            );
        }
        return error_response(e);
    }

    info!("Registered new user {}", user.user_id);
    auth_response(jwt, &user, StatusCode::CREATED)
}

/// POST /auth/login
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: LoginRequest = crate::try_service!(parse_json_body(req).await);
    if body.email.trim().is_empty() || body.password.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
            Some("BAD_REQUEST"),
        );
    }

    let jwt = crate::try_response!(jwt(&state));
    let store = crate::try_response!(require_store(&state));

    let email = body.email.trim().to_lowercase();
    let user = match store.users.find_one(doc! { "email": &email }).await {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_credentials(),
        Err(e) => return error_response(e),
    };

    match verify_password(&body.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Failed login for user {}", user.user_id);
            return invalid_credentials();
        }
        Err(e) => return error_response(e),
    }

    info!("User {} logged in", user.user_id);
    auth_response(jwt, &user, StatusCode::OK)
}

fn invalid_credentials() -> Response<BoxBody> {
    error_json(
        StatusCode::UNAUTHORIZED,
        "Invalid credentials",
        Some("INVALID_CREDENTIALS"),
    )
}

/// GET /auth/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let auth = crate::try_response!(authenticate(&req, &state));
    let store = crate::try_response!(require_store(&state));

    match store.users.find_one(doc! { "user_id": &auth.user_id }).await {
        Ok(Some(user)) => json_response(StatusCode::OK, &user.profile()),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "User not found", Some("USER_NOT_FOUND")),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_detection() {
        let err = IgniteError::Database("Insert failed: E11000 duplicate key error".into());
        assert!(is_duplicate_key(&err));
        assert!(!is_duplicate_key(&IgniteError::Database("timeout".into())));
    }

    #[test]
    fn test_register_request_defaults_missing_fields() {
        let body: RegisterRequest = serde_json::from_str(r#"{"email": "a@b.co"}"#).unwrap();
        assert_eq!(body.email, "a@b.co");
        assert!(body.name.is_empty());
        assert!(body.password.is_empty());
    }
}
