//! AI tutor routes

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::schemas::ChatMessage;
use crate::routes::{
    method_not_allowed, ok_json, parse_json_body, parse_query, require_store, AuthUser, BoxBody,
};
use crate::server::AppState;
use crate::services::tutor::{self, TutorRequest};

/// Identifies one module's conversation
#[derive(Debug, Deserialize)]
pub struct ModuleRef {
    pub phase_id: u32,
    pub module_id: u32,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<ChatMessage>,
}

pub async fn handle_tutor_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let response = match (method, rest) {
        (Method::POST, "chat") => chat(req, state, user).await,
        (Method::GET, "history") => history(req, state, user).await,
        (Method::POST, "clear-history") => clear_history(req, state, user).await,
        (_, "chat" | "history" | "clear-history") => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

async fn chat(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: TutorRequest = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    let profile = crate::try_service!(state.profiles.summary(store, &user.user_id).await);
    let reply = crate::try_service!(tutor::chat(store, &state.providers, &user.user_id, &profile, &body).await);
    ok_json(&reply)
}

async fn history(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let module: ModuleRef = crate::try_service!(parse_query(&req));
    let store = crate::try_response!(require_store(&state));

    let messages = crate::try_service!(
        tutor::history(store, &user.user_id, module.phase_id, module.module_id).await
    );
    ok_json(&HistoryResponse {
        session_id: crate::db::schemas::session_id(module.phase_id, module.module_id),
        messages,
    })
}

async fn clear_history(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let module: ModuleRef = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    crate::try_service!(tutor::clear_history(store, &user.user_id, module.phase_id, module.module_id).await);
    ok_json(&serde_json::json!({ "success": true, "message": "Chat history cleared" }))
}
