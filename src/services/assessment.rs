//! Daily assessments: generation, grading and sequential day unlocking.
//!
//! Day 1 of every phase is always open. Passing the assessment for day `d`
//! opens day `d + 1`, up to [`MAX_UNLOCK_DAY`].

use std::collections::{BTreeMap, BTreeSet};

use bson::doc;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{roadmap, try_complete};
use crate::cache::ResponseCache;
use crate::db::schemas::{AssessmentDoc, AssessmentRecord, Evaluation, Phase, ProgressDoc, RoadmapDoc};
use crate::db::Store;
use crate::llm::text::parse_json_reply;
use crate::llm::{CompletionRequest, Providers};
use crate::types::{IgniteError, Result};

pub const PASSING_SCORE: u32 = 70;
pub const MAX_UNLOCK_DAY: u32 = 30;

const GENERATION_MAX_TOKENS: u32 = 2000;

const CODING_PHRASES: &[&str] = &[
    "practice control flow",
    "practice functions",
    "implement",
    "build",
    "create",
    "calculator",
    "program",
    "code",
    "develop",
    "write",
    "coding",
    "programming",
];

const THEORY_PHRASES: &[&str] = &[
    "learn about",
    "understand",
    "study",
    "read",
    "concept",
    "theory",
    "explain",
    "describe",
];

const FORCE_CODING: &[&str] = &["practice", "implement", "calculator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentType {
    Theory,
    Coding,
}

impl AssessmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentType::Theory => "theory",
            AssessmentType::Coding => "coding",
        }
    }
}

/// The day being assessed, as the client sends it
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DayContent {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub phase_name: String,
    #[serde(default)]
    pub phase_skills: Vec<String>,
}

impl DayContent {
    fn text(&self) -> String {
        format!("{} {} {}", self.task, self.description, self.tasks.join(" ")).to_lowercase()
    }
}

/// Keyword heuristic: coding when coding phrases outnumber theory phrases,
/// or when the day mentions practice, implementation or a calculator.
pub fn detect_type(content: &DayContent) -> AssessmentType {
    let text = content.text();
    let coding = CODING_PHRASES.iter().filter(|p| text.contains(*p)).count();
    let theory = THEORY_PHRASES.iter().filter(|p| text.contains(*p)).count();

    if coding > theory || FORCE_CODING.iter().any(|p| text.contains(p)) {
        AssessmentType::Coding
    } else {
        AssessmentType::Theory
    }
}

fn theory_prompt(content: &DayContent) -> String {
    format!(
        r#"You are LEO AI, an expert assessment creator. Generate a comprehensive learning assessment for this day's content:

**Day Content:**
Task: {task}
Description: {description}
Phase: {phase}
Skills: {skills}

Create a JSON assessment with this EXACT structure:
{{
    "assessment_type": "theory",
    "questions": [
        {{
            "id": 1,
            "type": "multiple_choice",
            "question": "Clear, specific question text",
            "options": ["Option A", "Option B", "Option C", "Option D"],
            "correct_answer": 0,
            "explanation": "Why this answer is correct",
            "difficulty": "easy|medium|hard"
        }},
        {{
            "id": 2,
            "type": "short_answer",
            "question": "Question requiring 2-3 sentence explanation",
            "expected_keywords": ["keyword1", "keyword2", "keyword3"],
            "difficulty": "medium"
        }},
        {{
            "id": 3,
            "type": "scenario",
            "question": "Real-world scenario question",
            "scenario": "Detailed scenario description",
            "expected_approach": "Step-by-step approach expected",
            "difficulty": "hard"
        }}
    ],
    "total_questions": 3,
    "passing_score": 70,
    "estimated_time": "15-20 minutes"
}}

Requirements:
- Generate 3-5 relevant questions
- Mix difficulty levels (easy/medium/hard)
- Include practical scenarios
- Focus on understanding, not memorization
- Questions should test comprehension of: {task}

Return ONLY the JSON, no additional text."#,
        task = content.task,
        description = content.description,
        phase = content.phase_name,
        skills = content.phase_skills.join(", "),
    )
}

fn coding_prompt(content: &DayContent) -> String {
    let tasks_text = if content.tasks.is_empty() {
        content.task.clone()
    } else {
        content.tasks.join(", ")
    };
    format!(
        r#"You are LEO AI, an expert coding mentor. Create a coding assessment that EXACTLY matches the learning content provided.

**ACTUAL LEARNING CONTENT:**
- Main Task: {task}
- Today's Specific Tasks: {tasks}
- Description: {description}

Create a JSON assessment with this EXACT structure:
{{
    "assessment_type": "coding",
    "project_title": "Project title",
    "project_description": "What to build and which skills it demonstrates",
    "requirements": ["Requirement 1", "Requirement 2", "Requirement 3"],
    "github_guidelines": {{
        "repository_structure": "Expected layout",
        "file_requirements": ["main file", "README.md - how to run"],
        "commit_guidelines": "Clear commit messages for each feature",
        "readme_requirements": "What the README must explain"
    }},
    "submission_criteria": ["Public GitHub repository", "README with run instructions"],
    "evaluation_rubric": {{
        "functionality": "40%",
        "code_quality": "30%",
        "documentation": "30%"
    }},
    "estimated_time": "2-4 hours",
    "difficulty": "beginner|intermediate|advanced",
    "bonus_challenges": ["Optional extension"]
}}

**REQUIREMENTS:**
- Project must DIRECTLY relate to: {tasks}
- Keep it simple and focused
- Test ONLY the skills mentioned in the actual day content

Return ONLY the JSON, no additional text."#,
        task = content.task,
        tasks = tasks_text,
        description = content.description,
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAssessment {
    pub assessment_type: AssessmentType,
    pub assessment: Value,
    pub generator: String,
}

/// Generate an assessment with Bedrock, falling back to Groq
pub async fn generate(
    providers: &Providers,
    content: &DayContent,
    requested: Option<AssessmentType>,
) -> Result<GeneratedAssessment> {
    let assessment_type = requested.unwrap_or_else(|| detect_type(content));
    let prompt = match assessment_type {
        AssessmentType::Theory => theory_prompt(content),
        AssessmentType::Coding => coding_prompt(content),
    };

    let chain = [
        (providers.bedrock.as_ref(), "bedrock"),
        (providers.groq.as_ref(), "groq"),
    ];
    for (backend, generator) in chain {
        let request = CompletionRequest::user(prompt.clone())
            .with_max_tokens(GENERATION_MAX_TOKENS)
            .with_temperature(0.7);
        let Some(reply) = try_complete(backend, generator, request).await else {
            continue;
        };
        match parse_json_reply(&reply.content) {
            Some(assessment) => {
                info!(
                    "Generated {} assessment with {}",
                    assessment_type.as_str(),
                    generator
                );
                return Ok(GeneratedAssessment {
                    assessment_type,
                    assessment,
                    generator: generator.to_string(),
                });
            }
            None => warn!("{} assessment reply was not valid JSON", generator),
        }
    }

    Err(IgniteError::Upstream(
        "Assessment generation failed: no provider returned a valid assessment".into(),
    ))
}

// ============================================================================
// Grading
// ============================================================================

fn verdict(score: u32) -> (bool, &'static str) {
    if score >= PASSING_SCORE {
        (true, "PASSED")
    } else {
        (false, "FAILED - RETAKE REQUIRED")
    }
}

/// Grade free-text answers by length, penalizing blanks
pub fn evaluate_theory(answers: &BTreeMap<String, String>) -> Evaluation {
    let mut score: i64 = 0;
    let mut unanswered: i64 = 0;
    for answer in answers.values() {
        let len = answer.trim().chars().count();
        score += match len {
            0 => {
                unanswered += 1;
                0
            }
            n if n > 10 => 25,
            n if n > 3 => 15,
            _ => 5,
        };
    }
    score -= unanswered * 20;
    let score = score.clamp(0, 100) as u32;

    let (passed, status) = verdict(score);
    let (feedback, next_steps) = if passed {
        (
            "🎉 Excellent work! You've demonstrated good understanding of the concepts. You have successfully completed this assessment.".to_string(),
            "Continue to next module",
        )
    } else {
        (
            format!("📚 You scored {}%, but need 70% to pass. Please review the learning materials and try again. Focus on providing more detailed answers.", score),
            "Review materials and retake assessment",
        )
    };

    Evaluation {
        score,
        passed,
        status: status.to_string(),
        feedback,
        feedback_points: Vec::new(),
        next_steps: next_steps.to_string(),
    }
}

/// Grade a project submission (`github_url` and `description` answers)
pub fn evaluate_coding(answers: &BTreeMap<String, String>) -> Evaluation {
    let github_url = answers.get("github_url").map(String::as_str).unwrap_or("");
    let description = answers
        .get("description")
        .map(|d| d.trim())
        .unwrap_or("");
    let lower = description.to_lowercase();

    let mut score = 0;
    let mut points = Vec::new();

    if github_url.contains("github.com") {
        score += 30;
        points.push("✅ Valid GitHub URL provided");
    } else {
        points.push("❌ Invalid or missing GitHub URL");
    }

    match description.chars().count() {
        n if n > 50 => {
            score += 40;
            points.push("✅ Detailed project description provided");
        }
        n if n > 20 => {
            score += 20;
            points.push("⚠️ Basic description provided, could be more detailed");
        }
        _ => points.push("❌ Missing or insufficient project description"),
    }

    if ["readme", "documentation", "comments"].iter().any(|k| lower.contains(k)) {
        score += 15;
        points.push("✅ Good documentation practices mentioned");
    }
    if ["test", "error", "validation"].iter().any(|k| lower.contains(k)) {
        score += 15;
        points.push("✅ Testing or error handling mentioned");
    }

    let (passed, status) = verdict(score);
    let joined = points.join(" ");
    let (feedback, next_steps) = if passed {
        (format!("🎉 Great coding project! {}", joined), "Continue coding journey")
    } else {
        (
            format!(
                "📚 Score: {}%. Need 70% to pass. {} Please improve and resubmit.",
                score, joined
            ),
            "Improve project and resubmit",
        )
    };

    Evaluation {
        score,
        passed,
        status: status.to_string(),
        feedback,
        feedback_points: points.into_iter().map(str::to_string).collect(),
        next_steps: next_steps.to_string(),
    }
}

pub fn evaluate(assessment_type: AssessmentType, answers: &BTreeMap<String, String>) -> Evaluation {
    match assessment_type {
        AssessmentType::Theory => evaluate_theory(answers),
        AssessmentType::Coding => evaluate_coding(answers),
    }
}

// ============================================================================
// Unlocking
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockStatus {
    pub phase_id: u32,
    pub unlocked_days: Vec<u32>,
    pub completed_assessments: Vec<u32>,
    pub current_day: u32,
    pub unlock_trigger: String,
}

/// Days that should be open given the passed days
pub fn unlocked_days_for(completed: &[u32]) -> Vec<u32> {
    let mut days = BTreeSet::from([1]);
    for next in completed
        .iter()
        .filter_map(|day| day.checked_add(1))
        .filter(|d| *d <= MAX_UNLOCK_DAY)
    {
        days.insert(next);
    }
    days.into_iter().collect()
}

/// First open day without a passed assessment, else the last open day
pub fn current_day(unlocked: &[u32], completed: &[u32]) -> u32 {
    unlocked
        .iter()
        .copied()
        .find(|d| !completed.contains(d))
        .or_else(|| unlocked.iter().copied().max())
        .unwrap_or(1)
}

/// Days of a phase whose stored assessment record is a pass
pub fn passed_days(phase: &Phase) -> Vec<u32> {
    let mut days: Vec<u32> = phase
        .learning_plan
        .iter()
        .flat_map(|plan| plan.tasks())
        .filter(|task| {
            task.assessment
                .as_ref()
                .is_some_and(|a| a.completed && a.score >= PASSING_SCORE)
        })
        .map(|task| task.day)
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

async fn write_progress(
    store: &Store,
    user_id: &str,
    phase_id: u32,
    unlocked: &[u32],
    completed: &[u32],
    trigger: &str,
) -> Result<()> {
    store
        .progress
        .upsert_one(
            doc! { "user_id": user_id, "phase_id": phase_id },
            doc! {
                "user_id": user_id,
                "phase_id": phase_id,
                "unlocked_days": unlocked.to_vec(),
                "completed_assessments": completed.to_vec(),
                "unlock_trigger": trigger,
                "updated_at": bson::DateTime::now(),
            },
        )
        .await?;
    Ok(())
}

async fn load_progress(store: &Store, user_id: &str, phase_id: u32) -> Result<Option<ProgressDoc>> {
    store
        .progress
        .find_one(doc! { "user_id": user_id, "phase_id": phase_id })
        .await
}

/// Current unlock state, correcting and persisting it when it drifted
pub async fn unlock_status(store: &Store, user_id: &str, phase_id: u32) -> Result<UnlockStatus> {
    let stored = load_progress(store, user_id, phase_id).await?;

    let mut completed = stored
        .as_ref()
        .map(|p| p.completed_assessments.clone())
        .unwrap_or_default();
    completed.sort_unstable();
    completed.dedup();
    let correct = unlocked_days_for(&completed);

    let trigger = match &stored {
        None => {
            write_progress(store, user_id, phase_id, &correct, &completed, "initial").await?;
            "initial".to_string()
        }
        Some(doc) => {
            let stored_set: BTreeSet<u32> = doc.unlocked_days.iter().copied().collect();
            let correct_set: BTreeSet<u32> = correct.iter().copied().collect();
            if stored_set != correct_set {
                info!(
                    "Correcting unlocks for {} phase {}: {:?} -> {:?}",
                    user_id, phase_id, doc.unlocked_days, correct
                );
                write_progress(store, user_id, phase_id, &correct, &completed, "corrected").await?;
                "corrected".to_string()
            } else {
                doc.unlock_trigger.clone()
            }
        }
    };

    Ok(UnlockStatus {
        phase_id,
        current_day: current_day(&correct, &completed),
        unlocked_days: correct,
        completed_assessments: completed,
        unlock_trigger: trigger,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReset {
    pub phase_id: u32,
    pub completed_assessments: Vec<u32>,
    pub unlocked_days: Vec<u32>,
}

/// Rebuild every phase's unlock state from the roadmap's assessment records
pub async fn reset_all_phases(store: &Store, user_id: &str) -> Result<Vec<PhaseReset>> {
    let current = roadmap::require_current(store, user_id).await?;
    let mut results = Vec::with_capacity(current.phases.len());
    for (i, phase) in current.phases.iter().enumerate() {
        let phase_id = i as u32;
        let completed = passed_days(phase);
        let unlocked = unlocked_days_for(&completed);
        write_progress(store, user_id, phase_id, &unlocked, &completed, "reset_corrected").await?;
        results.push(PhaseReset {
            phase_id,
            completed_assessments: completed,
            unlocked_days: unlocked,
        });
    }
    info!("Reset unlock state for {} phases of {}", results.len(), user_id);
    Ok(results)
}

// ============================================================================
// Existing results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingStatus {
    /// Passed; no retake needed
    Completed,
    /// Attempted without passing; a retake is allowed
    Failed,
    NotTaken,
    /// The task reference does not exist on the roadmap
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExistingAssessment {
    pub status: ExistingStatus,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_record: Option<AssessmentRecord>,
}

/// Result already recorded on a roadmap task, if any
pub fn existing_assessment(
    roadmap: Option<&RoadmapDoc>,
    phase_id: usize,
    week_index: usize,
    task_index: usize,
) -> ExistingAssessment {
    let task = roadmap
        .and_then(|r| r.phases.get(phase_id))
        .and_then(|phase| phase.learning_plan.as_ref())
        .and_then(|plan| plan.weekly_schedule.get(week_index))
        .and_then(|week| week.daily_tasks.get(task_index));

    let Some(task) = task else {
        return ExistingAssessment {
            status: ExistingStatus::NotFound,
            message: "Assessment not found",
            assessment_record: None,
        };
    };

    match &task.assessment {
        Some(record) if record.passed && record.score >= PASSING_SCORE => ExistingAssessment {
            status: ExistingStatus::Completed,
            message: "Assessment already completed and passed",
            assessment_record: Some(record.clone()),
        },
        Some(record) => ExistingAssessment {
            status: ExistingStatus::Failed,
            message: "Assessment failed - retake allowed",
            assessment_record: Some(record.clone()),
        },
        None => ExistingAssessment {
            status: ExistingStatus::NotTaken,
            message: "Assessment not yet taken",
            assessment_record: None,
        },
    }
}

// ============================================================================
// Submission
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub phase_id: u32,
    /// One-based day number within the phase
    pub day: u32,
    pub week_index: usize,
    pub task_index: usize,
    pub assessment_type: AssessmentType,
    #[serde(alias = "assessment_answers")]
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub evaluation: Evaluation,
    pub passed: bool,
    pub score: u32,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_day_unlocked: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_message: Option<String>,
}

/// Reject submissions with no answers or a day outside `1..=MAX_UNLOCK_DAY`
pub fn validate_submission(request: &SubmitRequest) -> Result<()> {
    if request.answers.is_empty() {
        return Err(IgniteError::BadRequest("Missing required fields".into()));
    }
    if request.day == 0 || request.day > MAX_UNLOCK_DAY {
        return Err(IgniteError::BadRequest(format!(
            "day must be between 1 and {}",
            MAX_UNLOCK_DAY
        )));
    }
    Ok(())
}

/// Grade a submission, record it on the roadmap task and in the
/// assessments collection, and unlock the next day on a pass
pub async fn submit(
    store: &Store,
    cache: &ResponseCache,
    user_id: &str,
    request: &SubmitRequest,
) -> Result<SubmitOutcome> {
    validate_submission(request)?;
    let evaluation = evaluate(request.assessment_type, &request.answers);
    let passed = evaluation.passed;
    let now = Utc::now();

    let mut current = roadmap::require_current(store, user_id).await?;
    let task = current
        .phases
        .get_mut(request.phase_id as usize)
        .and_then(|phase| phase.learning_plan.as_mut())
        .and_then(|plan| plan.weekly_schedule.get_mut(request.week_index))
        .and_then(|week| week.daily_tasks.get_mut(request.task_index))
        .ok_or_else(|| IgniteError::BadRequest("Invalid task reference".into()))?;

    let attempts = task.assessment.as_ref().map(|a| a.attempts).unwrap_or(0) + 1;
    task.assessment = Some(AssessmentRecord {
        assessment_type: request.assessment_type.as_str().to_string(),
        score: evaluation.score,
        passed,
        completed: passed,
        attempts,
        last_attempt: now,
    });
    current.roadmap_meta.updated_at = now;
    roadmap::save(store, cache, &current).await?;

    store
        .assessments
        .insert_one(AssessmentDoc {
            user_id: user_id.to_string(),
            phase_id: request.phase_id,
            day: request.day,
            assessment_type: request.assessment_type.as_str().to_string(),
            answers: request.answers.clone(),
            evaluation: evaluation.clone(),
            score: evaluation.score,
            passed,
            attempt: attempts,
            submitted_at: Some(bson::DateTime::now()),
            ..Default::default()
        })
        .await?;

    let mut outcome = SubmitOutcome {
        score: evaluation.score,
        evaluation,
        passed,
        attempts,
        next_day_unlocked: None,
        unlock_message: None,
    };

    if passed {
        let stored = load_progress(store, user_id, request.phase_id).await?;
        let mut completed = stored
            .as_ref()
            .map(|p| p.completed_assessments.clone())
            .unwrap_or_default();
        if !completed.contains(&request.day) {
            completed.push(request.day);
        }
        completed.sort_unstable();

        let was_unlocked = stored
            .as_ref()
            .is_some_and(|p| p.unlocked_days.contains(&(request.day + 1)));
        let unlocked = unlocked_days_for(&completed);
        write_progress(
            store,
            user_id,
            request.phase_id,
            &unlocked,
            &completed,
            "auto_sequential",
        )
        .await?;

        let next = request.day + 1;
        if unlocked.contains(&next) {
            outcome.next_day_unlocked = Some(next);
            outcome.unlock_message = Some(if was_unlocked {
                format!("Day {} already unlocked", next)
            } else {
                format!("Day {} assessment unlocked!", next)
            });
        }
    }

    info!(
        "Assessment for {} phase {} day {}: {}% ({}), attempt {}",
        user_id,
        request.phase_id,
        request.day,
        outcome.score,
        if outcome.passed { "passed" } else { "failed" },
        outcome.attempts
    );
    Ok(outcome)
}
