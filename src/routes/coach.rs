//! LEO career coach routes

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::schemas::CoachMessage;
use crate::routes::{method_not_allowed, ok_json, parse_json_body, require_store, AuthUser, BoxBody};
use crate::server::AppState;
use crate::services::coach;

#[derive(Debug, Deserialize)]
pub struct CoachChatRequest {
    #[serde(default, alias = "question")]
    pub message: String,
    #[serde(default)]
    pub use_bedrock: bool,
}

#[derive(Debug, Serialize)]
struct CoachHistory {
    messages: Vec<CoachMessage>,
}

pub async fn handle_coach_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let response = match (method, rest) {
        (Method::POST, "chat") => chat(req, state, user).await,
        (Method::GET, "history") => history(state, user).await,
        (Method::POST, "clear") => clear(state, user).await,
        (_, "chat" | "history" | "clear") => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

async fn chat(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: CoachChatRequest = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    let summary = crate::try_service!(state.profiles.summary(store, &user.user_id).await);
    let reply = crate::try_service!(
        coach::chat(
            store,
            &state.providers,
            &user.user_id,
            &summary,
            &body.message,
            body.use_bedrock,
        )
        .await
    );
    ok_json(&reply)
}

async fn history(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let messages = crate::try_service!(coach::history(store, &user.user_id).await);
    ok_json(&CoachHistory { messages })
}

async fn clear(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let cleared = crate::try_service!(coach::clear(store, &user.user_id).await);
    ok_json(&serde_json::json!({ "success": true, "cleared": cleared }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_accepts_question_alias() {
        let body: CoachChatRequest = serde_json::from_str(r#"{"question": "How do I grow?"}"#).unwrap();
        assert_eq!(body.message, "How do I grow?");
        assert!(!body.use_bedrock);
    }
}
