//! Roadmap routes
//!
//! - GET  /api/roadmap - the current roadmap (cached view)
//! - POST /api/roadmap/generate - generate a new roadmap from the profile
//! - POST /api/roadmap/phases/{p}/plan - generate a phase learning plan
//! - POST /api/roadmap/complete-task - mark a daily task
//! - GET  /api/roadmap/stats - completion stats
//! - POST /api/roadmap/analyze-and-adapt - analysis plus adaptation
//! - POST /api/roadmap/refresh-progress - analysis only

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{cache_key, CachePrefix, TimeoutClass};
use crate::routes::{
    error_json, json_response, method_not_allowed, ok_json, parse_json_body, path_param,
    require_store, AuthUser, BoxBody,
};
use crate::server::AppState;
use crate::services::progress::{self, DelayAnalysis, ProgressAnalysis};
use crate::services::{learning_plan, roadmap};
use crate::services::roadmap::RoadmapView;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    /// Overrides (and replaces) the goal stored on the profile
    #[serde(default)]
    pub career_goal: Option<String>,
    #[serde(default)]
    pub enhance_resources: bool,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub phase_id: usize,
    pub week_index: usize,
    pub day_index: usize,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ProgressRefresh {
    pub progress_analysis: ProgressAnalysis,
    pub delay_analysis: DelayAnalysis,
}

pub async fn handle_roadmap_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();

    if let Some(phase) = rest
        .strip_prefix("/phases/")
        .and_then(|r| r.strip_suffix("/plan"))
    {
        return Some(match method {
            Method::POST => create_plan(state, user, phase).await,
            _ => method_not_allowed(),
        });
    }

    let response = match (method, rest) {
        (Method::GET, "" | "/") => get_roadmap(state, user).await,
        (Method::POST, "/generate") => generate(req, state, user).await,
        (Method::POST, "/complete-task") => complete_task(req, state, user).await,
        (Method::GET, "/stats") => stats(state, user).await,
        (Method::POST, "/analyze-and-adapt") => analyze_and_adapt(state, user).await,
        (Method::POST, "/refresh-progress") => refresh_progress(state, user).await,
        (
            _,
            "" | "/" | "/generate" | "/complete-task" | "/stats" | "/analyze-and-adapt"
            | "/refresh-progress",
        ) => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

/// POST /api/roadmap/generate
async fn generate(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: GenerateRequest = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    let account = crate::try_service!(store.users.find_one(doc! { "user_id": &user.user_id }).await);
    let Some(account) = account else {
        return error_json(StatusCode::NOT_FOUND, "User not found", Some("USER_NOT_FOUND"));
    };

    let override_goal = body
        .career_goal
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());
    let career_goal = match override_goal.or(account.career_goal.as_deref().map(str::trim)) {
        Some(goal) if !goal.is_empty() => goal.to_string(),
        _ => {
            return error_json(
                StatusCode::BAD_REQUEST,
                "A career goal is required. Set one on your profile or pass career_goal.",
                Some("BAD_REQUEST"),
            )
        }
    };

    if override_goal.is_some() && account.career_goal.as_deref() != Some(career_goal.as_str()) {
        crate::try_service!(
            store
                .users
                .update_one(
                    doc! { "user_id": &user.user_id },
                    doc! { "$set": { "career_goal": &career_goal } },
                )
                .await
        );
        state.profiles.invalidate(&user.user_id).await;
    }

    let summary = crate::try_service!(state.profiles.summary(store, &user.user_id).await);
    let created = crate::try_service!(
        roadmap::create(
            store,
            &state.providers,
            &state.cache,
            &user.user_id,
            &career_goal,
            &summary,
            body.enhance_resources,
        )
        .await
    );

    info!(
        "Roadmap for {} generated from {} with {} phases",
        user.user_id,
        created.roadmap_meta.source,
        created.phases.len()
    );
    json_response(StatusCode::CREATED, &RoadmapView::from(&created))
}

/// GET /api/roadmap
async fn get_roadmap(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let key = cache_key(CachePrefix::Roadmap, &user.user_id, None);
    if let Some(view) = state.cache.get::<RoadmapView>(&key).await {
        debug!("Roadmap cache hit for {}", user.user_id);
        return ok_json(&view);
    }

    let store = crate::try_response!(require_store(&state));
    let current = crate::try_service!(roadmap::require_current(store, &user.user_id).await);
    let view = RoadmapView::from(&current);
    state.cache.set(&key, &view, TimeoutClass::Long).await;
    ok_json(&view)
}

/// POST /api/roadmap/phases/{p}/plan
async fn create_plan(state: Arc<AppState>, user: AuthUser, phase: &str) -> Response<BoxBody> {
    let phase_id: usize = crate::try_service!(path_param(phase, "phase_id"));
    let store = crate::try_response!(require_store(&state));

    let mut current = crate::try_service!(roadmap::require_current(store, &user.user_id).await);
    let summary = crate::try_service!(state.profiles.summary(store, &user.user_id).await);
    let plan = crate::try_service!(
        learning_plan::create_for_phase(
            store,
            &state.providers,
            &state.cache,
            &mut current,
            phase_id,
            &summary,
        )
        .await
    );
    json_response(StatusCode::CREATED, &plan)
}

/// POST /api/roadmap/complete-task
async fn complete_task(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: CompleteTaskRequest = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    let result = crate::try_service!(
        progress::complete_task_for_user(
            store,
            &state.cache,
            &user.user_id,
            body.phase_id,
            body.week_index,
            body.day_index,
            body.completed,
        )
        .await
    );
    ok_json(&result)
}

/// GET /api/roadmap/stats
async fn stats(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let current = crate::try_service!(roadmap::require_current(store, &user.user_id).await);
    ok_json(&progress::stats(&current))
}

/// POST /api/roadmap/analyze-and-adapt
async fn analyze_and_adapt(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let report = crate::try_service!(progress::analyze_and_adapt(store, &state.cache, &user.user_id).await);
    ok_json(&report)
}

/// POST /api/roadmap/refresh-progress
async fn refresh_progress(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let current = crate::try_service!(roadmap::require_current(store, &user.user_id).await);

    let progress_analysis = progress::analyze_progress(&current, chrono::Utc::now());
    let delay_analysis = progress::detect_delays(&progress_analysis);
    ok_json(&ProgressRefresh {
        progress_analysis,
        delay_analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_task_defaults_to_completed() {
        let body: CompleteTaskRequest =
            serde_json::from_str(r#"{"phase_id": 0, "week_index": 1, "day_index": 2}"#).unwrap();
        assert!(body.completed);
        assert_eq!(body.week_index, 1);
    }

    #[test]
    fn test_generate_request_is_optional() {
        let body: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(body.career_goal.is_none());
        assert!(!body.enhance_resources);
    }
}
