//! Assessment routes
//!
//! - GET  /api/assessment/unlock-status/{p}
//! - POST /api/assessment/generate
//! - POST /api/assessment/submit
//! - POST /api/assessment/reset-all-phases
//! - POST /api/assessment/check-existing

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::schemas::RoadmapDoc;
use crate::routes::{
    method_not_allowed, ok_json, parse_json_body, path_param, require_store, AuthUser, BoxBody,
};
use crate::server::AppState;
use crate::services::assessment::{self, AssessmentType, DayContent, SubmitRequest};
use crate::services::roadmap;
use crate::types::{IgniteError, Result};

/// Either the day's content inline or a reference to a roadmap task
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, alias = "task_data")]
    pub day_content: Option<DayContent>,
    pub phase_id: Option<usize>,
    pub week_index: Option<usize>,
    pub day_index: Option<usize>,
    pub assessment_type: Option<AssessmentType>,
}

/// A task on the roadmap, addressed by position
#[derive(Debug, Deserialize)]
pub struct TaskRef {
    pub phase_id: usize,
    pub week_index: usize,
    pub task_index: usize,
}

pub async fn handle_assessment_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();

    if let Some(phase) = rest.strip_prefix("unlock-status/") {
        return Some(match method {
            Method::GET => unlock_status(state, user, phase).await,
            _ => method_not_allowed(),
        });
    }

    let response = match (method, rest) {
        (Method::POST, "generate") => generate(req, state, user).await,
        (Method::POST, "submit") => submit(req, state, user).await,
        (Method::POST, "reset-all-phases") => reset_all_phases(state, user).await,
        (Method::POST, "check-existing") => check_existing(req, state, user).await,
        (_, "generate" | "submit" | "reset-all-phases" | "check-existing") => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

async fn unlock_status(state: Arc<AppState>, user: AuthUser, phase: &str) -> Response<BoxBody> {
    let phase_id: u32 = crate::try_service!(path_param(phase, "phase_id"));
    let store = crate::try_response!(require_store(&state));
    let status = crate::try_service!(assessment::unlock_status(store, &user.user_id, phase_id).await);
    ok_json(&status)
}

/// Day content for a task on the user's roadmap
fn day_content_from(roadmap: &RoadmapDoc, phase_id: usize, week_index: usize, day_index: usize) -> Result<DayContent> {
    let phase = roadmap
        .phases
        .get(phase_id)
        .ok_or_else(|| IgniteError::BadRequest(format!("Invalid phase_id {}", phase_id)))?;
    let week = phase
        .learning_plan
        .as_ref()
        .and_then(|plan| plan.weekly_schedule.get(week_index))
        .ok_or_else(|| IgniteError::BadRequest("Invalid task reference".into()))?;
    let task = week
        .daily_tasks
        .get(day_index)
        .ok_or_else(|| IgniteError::BadRequest("Invalid task reference".into()))?;

    Ok(DayContent {
        task: task.tasks.first().cloned().unwrap_or_default(),
        description: week.learning_objectives.join("; "),
        tasks: task.tasks.clone(),
        phase_name: phase.name.clone(),
        phase_skills: phase.skills.clone(),
    })
}

async fn generate(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: GenerateRequest = crate::try_service!(parse_json_body(req).await);

    let content = match (body.day_content, body.phase_id, body.week_index, body.day_index) {
        (Some(content), _, _, _) => content,
        (None, Some(phase_id), Some(week_index), Some(day_index)) => {
            let store = crate::try_response!(require_store(&state));
            let current = crate::try_service!(roadmap::require_current(store, &user.user_id).await);
            crate::try_service!(day_content_from(&current, phase_id, week_index, day_index))
        }
        _ => {
            return crate::routes::error_response(IgniteError::BadRequest(
                "Provide day_content or phase_id, week_index and day_index".into(),
            ))
        }
    };

    let generated = crate::try_service!(assessment::generate(&state.providers, &content, body.assessment_type).await);
    ok_json(&generated)
}

async fn submit(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: SubmitRequest = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));
    let outcome = crate::try_service!(assessment::submit(store, &state.cache, &user.user_id, &body).await);
    ok_json(&outcome)
}

async fn check_existing(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let task: TaskRef = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));
    let current = crate::try_service!(roadmap::current(store, &user.user_id).await);
    ok_json(&assessment::existing_assessment(
        current.as_ref(),
        task.phase_id,
        task.week_index,
        task.task_index,
    ))
}

async fn reset_all_phases(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let phases = crate::try_service!(assessment::reset_all_phases(store, &user.user_id).await);
    ok_json(&serde_json::json!({ "success": true, "phases": phases }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{DailyTask, LearningPlan, Phase, WeekPlan};

    fn roadmap() -> RoadmapDoc {
        RoadmapDoc {
            phases: vec![Phase {
                name: "Python Basics".into(),
                skills: vec!["Python".into()],
                learning_plan: Some(LearningPlan {
                    weekly_schedule: vec![WeekPlan {
                        week: 1,
                        learning_objectives: vec!["Variables".into()],
                        daily_tasks: vec![DailyTask {
                            day: 1,
                            tasks: vec!["Build a calculator".into()],
                            ..Default::default()
                        }],
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_day_content_from_roadmap_task() {
        let content = day_content_from(&roadmap(), 0, 0, 0).unwrap();
        assert_eq!(content.task, "Build a calculator");
        assert_eq!(content.phase_name, "Python Basics");
        assert_eq!(content.description, "Variables");
        assert_eq!(assessment::detect_type(&content), AssessmentType::Coding);
    }

    #[test]
    fn test_day_content_rejects_bad_reference() {
        assert!(day_content_from(&roadmap(), 0, 0, 3).is_err());
        assert!(day_content_from(&roadmap(), 2, 0, 0).is_err());
    }
}
