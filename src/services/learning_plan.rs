//! Weekly learning plans for a roadmap phase (level 2).

use chrono::Utc;
use tracing::{info, warn};

use super::roadmap::{self, structuring_request};
use super::{parse, try_complete};
use crate::cache::ResponseCache;
use crate::db::schemas::{DailyTask, LearningPlan, LearningPlanMeta, Phase, RoadmapDoc, WeekPlan};
use crate::db::Store;
use crate::llm::text::{clean_json_response, exceeds_token_limit, truncate_chars};
use crate::llm::{CompletionRequest, Providers};
use crate::types::{IgniteError, Result};

pub const LEVEL_MULTI: &str = "level_2_multi_level";
pub const LEVEL_GROQ: &str = "level_2_groq";
pub const LEVEL_FALLBACK: &str = "fallback";

const METHODS_SYSTEM: &str = "You are a learning methodology observer. Report current best practices, effective learning methods, and practical approaches without analysis. Focus on what learning approaches are proven to work.";

const SCHEDULE_TEMPLATE: &str = r#"{
    "weekly_schedule": [
        {
            "week": 1,
            "learning_objectives": ["Objective 1", "Objective 2"],
            "daily_tasks": [
                {
                    "day": 1,
                    "tasks": ["Task 1", "Task 2"],
                    "resources": ["Resource 1"],
                    "duration_hours": 2
                }
            ],
            "assessment": "Weekly project"
        }
    ]
}"#;

/// One-week plan used when no provider produced a schedule
pub fn fallback_schedule(phase_name: &str) -> Vec<WeekPlan> {
    vec![WeekPlan {
        week: 1,
        learning_objectives: vec![format!("Learn {} basics", phase_name)],
        daily_tasks: vec![DailyTask {
            day: 1,
            tasks: vec!["Study fundamentals".to_string()],
            resources: vec!["Online resources".to_string()],
            duration_hours: 2.0,
            ..Default::default()
        }],
        assessment: Some("Practice exercises".to_string()),
    }]
}

fn methods_query(phase: &Phase, skills: &str, profile_summary: &str) -> String {
    format!(
        "What are the current best practices, learning methods, daily activities, and study approaches for mastering these skills: {skills}

Phase focus: {name}
Phase description: {description}

Observe and report factual information about:
- Most effective learning sequences and methods
- Daily practice activities and exercises
- Current online resources and platforms
- Hands-on projects and practical applications
- Time estimates for different learning activities
- Assessment methods and milestones
- Common learning challenges and solutions
- Industry-recommended study schedules

Student context: {profile}

Focus on current, practical learning approaches that work in 2025.",
        skills = skills,
        name = phase.name,
        description = phase.description,
        profile = truncate_chars(profile_summary, 200)
    )
}

fn parse_schedule(raw: &str) -> Option<Vec<WeekPlan>> {
    let value = serde_json::from_str::<serde_json::Value>(&clean_json_response(raw)).ok()?;
    parse::weekly_schedule(&value)
}

async fn multi_level(providers: &Providers, phase: &Phase, profile_summary: &str) -> Option<Vec<WeekPlan>> {
    let skills = phase.skills.join(", ");
    let observe = CompletionRequest::user(methods_query(phase, &skills, profile_summary))
        .with_system(METHODS_SYSTEM)
        .with_temperature(0.1)
        .with_top_p(0.8)
        .with_max_tokens(2500)
        .with_search_focus("educational");
    let mut methods = try_complete(providers.perplexity.as_ref(), "Perplexity methods", observe)
        .await?
        .content;

    let combined = format!(
        "Profile: {}\n\nPhase: {}\n\nSkills: {}\n\nLearning Methods: {}",
        profile_summary, phase.name, skills, methods
    );
    if exceeds_token_limit(&combined, roadmap::PROMPT_TOKEN_LIMIT) {
        info!("Learning plan input too long, shortening observations");
        methods = truncate_chars(&methods, 2000);
    }

    let prompt = format!(
        "Create a weekly learning schedule for {} with skills: {}\n\nLEARNING METHODS DATA:\n{}\n\nCreate 4-6 weeks with daily tasks:\n{}",
        phase.name,
        skills,
        truncate_chars(&methods, 1500),
        SCHEDULE_TEMPLATE
    );
    let reply = try_complete(providers.groq.as_ref(), "Groq schedule", structuring_request(&prompt, 5000)).await?;
    let schedule = parse_schedule(&reply.content);
    if schedule.is_none() {
        warn!("Learning plan reply for '{}' could not be parsed", phase.name);
    }
    schedule
}

async fn groq_only(providers: &Providers, phase: &Phase) -> Option<Vec<WeekPlan>> {
    let prompt = format!(
        "Generate learning plan for {} phase with skills: {}. Return pure JSON:\n{}",
        phase.name,
        phase.skills.join(", "),
        SCHEDULE_TEMPLATE
    );
    let request = CompletionRequest::user(prompt)
        .with_system("Return valid JSON only")
        .with_temperature(0.0)
        .with_json_output();
    let reply = try_complete(providers.groq.as_ref(), "Groq plan", request).await?;
    parse_schedule(&reply.content)
}

/// Build a learning plan for a phase with tracking fields initialized
pub async fn generate(providers: &Providers, phase: &Phase, profile_summary: &str) -> LearningPlan {
    let (weekly_schedule, level) = match multi_level(providers, phase, profile_summary).await {
        Some(schedule) => (schedule, LEVEL_MULTI),
        None => match groq_only(providers, phase).await {
            Some(schedule) => (schedule, LEVEL_GROQ),
            None => (fallback_schedule(&phase.name), LEVEL_FALLBACK),
        },
    };

    let mut plan = LearningPlan {
        weekly_schedule,
        plan_meta: None,
        adaptation_flags: None,
    };
    plan.initialize_tasks();
    plan.plan_meta = Some(LearningPlanMeta {
        generated_at: Utc::now(),
        enhancement_level: level.to_string(),
        total_weeks: plan.weekly_schedule.len() as u32,
        total_tasks: plan.total_tasks(),
        completed_tasks: 0,
        progress_percentage: 0.0,
    });
    plan
}

/// Attach a generated plan to phase `phase_id` of the roadmap and persist it.
///
/// A phase that already has a plan is a conflict; plans are never regenerated
/// over recorded progress.
pub async fn create_for_phase(
    store: &Store,
    providers: &Providers,
    cache: &ResponseCache,
    roadmap: &mut RoadmapDoc,
    phase_id: usize,
    profile_summary: &str,
) -> Result<LearningPlan> {
    let phase = roadmap
        .phases
        .get(phase_id)
        .ok_or_else(|| IgniteError::BadRequest(format!("Invalid phase_id {}", phase_id)))?;
    if phase.learning_plan.is_some() {
        return Err(IgniteError::Conflict(
            "Learning plan already exists for this phase".into(),
        ));
    }

    let plan = generate(providers, phase, profile_summary).await;
    info!(
        "Generated {}-week plan for phase {} of {}'s roadmap",
        plan.weekly_schedule.len(),
        phase_id,
        roadmap.user_id
    );

    if let Some(phase) = roadmap.phases.get_mut(phase_id) {
        phase.learning_plan = Some(plan.clone());
    }
    roadmap
        .roadmap_meta
        .enhanced_with
        .insert("level_2_detailed_tasks".to_string(), true);
    roadmap.roadmap_meta.updated_at = Utc::now();
    roadmap::save(store, cache, roadmap).await?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmBackend, MockBackend};
    use std::sync::Arc;

    const PLAN_JSON: &str = r#"{"weekly_schedule": [
        {"week": 1, "learning_objectives": ["Syntax"], "daily_tasks": [
            {"day": 1, "tasks": ["Install Python"], "resources": ["python.org"], "duration_hours": 1},
            {"day": 2, "tasks": ["Variables"], "resources": [], "duration_hours": 2}
        ], "assessment": "Quiz"},
        {"week": 2, "learning_objectives": ["Functions"], "daily_tasks": [
            {"day": 1, "tasks": ["Write functions"], "resources": [], "duration_hours": 2}
        ]}
    ]}"#;

    fn phase() -> Phase {
        Phase {
            name: "Python Basics".into(),
            skills: vec!["Python".into(), "Git".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_multi_level_plan_is_initialized() {
        let providers = Providers {
            groq: Some(Arc::new(MockBackend::new("llama").with_response(PLAN_JSON)) as Arc<dyn LlmBackend>),
            perplexity: Some(Arc::new(MockBackend::new("sonar").with_response("spaced repetition"))),
            bedrock: None,
        };

        let plan = generate(&providers, &phase(), "Student: Ada").await;
        let ids: Vec<_> = plan.tasks().map(|t| t.task_id.clone()).collect();
        assert_eq!(ids, vec!["w1_d1", "w1_d2", "w2_d1"]);
        assert!(plan.tasks().all(|t| !t.completed));

        let meta = plan.plan_meta.unwrap();
        assert_eq!(meta.enhancement_level, LEVEL_MULTI);
        assert_eq!(meta.total_weeks, 2);
        assert_eq!(meta.total_tasks, 3);
        assert_eq!(meta.progress_percentage, 0.0);
    }

    #[tokio::test]
    async fn test_perplexity_request_uses_educational_focus() {
        let perplexity = Arc::new(MockBackend::new("sonar").with_response("methods"));
        let providers = Providers {
            groq: Some(Arc::new(MockBackend::new("llama").with_response(PLAN_JSON))),
            perplexity: Some(perplexity.clone()),
            bedrock: None,
        };

        generate(&providers, &phase(), "").await;
        let request = perplexity.last_request().unwrap();
        assert_eq!(request.search_focus.as_deref(), Some("educational"));
        assert!(request.prompt().contains("mastering these skills: Python, Git"));
    }

    #[tokio::test]
    async fn test_no_providers_yields_fallback_week() {
        let plan = generate(&Providers::default(), &phase(), "").await;
        assert_eq!(plan.weekly_schedule.len(), 1);
        assert_eq!(
            plan.weekly_schedule[0].learning_objectives,
            vec!["Learn Python Basics basics"]
        );
        assert_eq!(plan.weekly_schedule[0].daily_tasks[0].task_id, "w1_d1");
        assert_eq!(plan.plan_meta.unwrap().enhancement_level, LEVEL_FALLBACK);
    }
}
