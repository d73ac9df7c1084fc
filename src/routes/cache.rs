//! Cache inspection and clearing
//!
//! Clearing is only enabled when the server runs with DEBUG.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::routes::{error_json, method_not_allowed, ok_json, AuthUser, BoxBody};
use crate::server::AppState;

pub async fn handle_cache_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let response = match (method, rest) {
        (Method::GET, "stats") => ok_json(&state.cache.health().await),
        (Method::POST, "clear/user") => clear(&state, &user, false).await,
        (Method::POST, "clear/api") => clear(&state, &user, true).await,
        (_, "stats" | "clear/user" | "clear/api") => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

async fn clear(state: &AppState, user: &AuthUser, api: bool) -> Response<BoxBody> {
    if !state.args.debug {
        return error_json(
            StatusCode::FORBIDDEN,
            "Cache clearing is only available in debug mode",
            Some("FORBIDDEN"),
        );
    }

    let cleared = if api {
        state.cache.clear_api_cache().await
    } else {
        state.profiles.invalidate(&user.user_id).await
    };
    info!(
        "Cleared {} {} cache entries",
        cleared,
        if api { "API" } else { "user" }
    );
    ok_json(&json!({ "success": true, "cleared": cleared }))
}
