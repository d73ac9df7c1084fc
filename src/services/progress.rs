//! Task completion, progress statistics and adaptive roadmap analysis.
//!
//! Analysis is pure: callers pass the roadmap and the current time, so the
//! delay rules can be exercised without a database or a clock.

use chrono::Duration;
use serde::Serialize;
use tracing::info;

use super::roadmap;
use crate::cache::ResponseCache;
use crate::db::schemas::{
    percentage, Adaptation, AdaptationFlags, AdaptationRecord, AdaptiveSettings, CatchUpPlan,
    CompletionEvent, Phase, RoadmapDoc, Timestamp,
};
use crate::db::Store;
use crate::types::{IgniteError, Result};

/// Days behind above which a phase counts as behind schedule
pub const BEHIND_THRESHOLD_DAYS: i64 = 3;

/// Actual/expected ratios for fast and slow learners
pub const FAST_VELOCITY_RATIO: f64 = 1.2;
pub const SLOW_VELOCITY_RATIO: f64 = 0.7;

/// Weekday study days assumed when converting a delay into extra weeks
const STUDY_DAYS_PER_WEEK: i64 = 5;

// ============================================================================
// Task completion and stats
// ============================================================================

/// Progress of one phase after a task update
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskProgress {
    pub task_id: String,
    pub completed: bool,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub percentage: f64,
}

/// Mark a single daily task as done or not done.
///
/// Indexes are zero-based positions in the phase list, the weekly schedule
/// and the week's daily tasks. Anything out of range is a bad request.
pub fn complete_task(
    roadmap: &mut RoadmapDoc,
    phase_id: usize,
    week_index: usize,
    day_index: usize,
    completed: bool,
    now: Timestamp,
) -> Result<TaskProgress> {
    let phase = roadmap
        .phases
        .get_mut(phase_id)
        .ok_or_else(|| IgniteError::BadRequest(format!("Invalid phase_id {}", phase_id)))?;
    let plan = phase.learning_plan.as_mut().ok_or_else(|| {
        IgniteError::BadRequest(format!("Phase {} has no learning plan", phase_id))
    })?;
    let task = plan
        .weekly_schedule
        .get_mut(week_index)
        .and_then(|week| week.daily_tasks.get_mut(day_index))
        .ok_or_else(|| {
            IgniteError::BadRequest(format!(
                "Invalid task reference: week {} day {}",
                week_index, day_index
            ))
        })?;

    task.completed = completed;
    task.completed_date = completed.then_some(now);
    task.completion_history.push(CompletionEvent {
        completed,
        timestamp: now,
    });
    let task_id = task.task_id.clone();

    plan.refresh_progress();
    let completed_tasks = plan.completed_tasks();
    let total_tasks = plan.total_tasks();
    roadmap.roadmap_meta.updated_at = now;

    Ok(TaskProgress {
        task_id,
        completed,
        completed_tasks,
        total_tasks,
        percentage: percentage(completed_tasks, total_tasks),
    })
}

/// Apply [`complete_task`] to the user's current roadmap and persist it
pub async fn complete_task_for_user(
    store: &Store,
    cache: &ResponseCache,
    user_id: &str,
    phase_id: usize,
    week_index: usize,
    day_index: usize,
    completed: bool,
) -> Result<TaskProgress> {
    let mut current = roadmap::require_current(store, user_id).await?;
    let progress = complete_task(
        &mut current,
        phase_id,
        week_index,
        day_index,
        completed,
        chrono::Utc::now(),
    )?;
    roadmap::save(store, cache, &current).await?;
    info!(
        "Task {} for {} marked {}",
        progress.task_id,
        user_id,
        if completed { "completed" } else { "not completed" }
    );
    Ok(progress)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseStats {
    pub phase_id: usize,
    pub name: String,
    pub has_learning_plan: bool,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoadmapStats {
    pub total_phases: usize,
    pub phases_with_plans: usize,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub completion_percentage: f64,
    pub phases: Vec<PhaseStats>,
}

pub fn stats(roadmap: &RoadmapDoc) -> RoadmapStats {
    let phases: Vec<PhaseStats> = roadmap
        .phases
        .iter()
        .enumerate()
        .map(|(i, phase)| {
            let (completed, total) = phase
                .learning_plan
                .as_ref()
                .map(|p| (p.completed_tasks(), p.total_tasks()))
                .unwrap_or((0, 0));
            PhaseStats {
                phase_id: i,
                name: phase.name.clone(),
                has_learning_plan: phase.learning_plan.is_some(),
                total_tasks: total,
                completed_tasks: completed,
                percentage: percentage(completed, total),
            }
        })
        .collect();

    let total_tasks = phases.iter().map(|p| p.total_tasks).sum();
    let completed_tasks = phases.iter().map(|p| p.completed_tasks).sum();
    RoadmapStats {
        total_phases: phases.len(),
        phases_with_plans: phases.iter().filter(|p| p.has_learning_plan).count(),
        total_tasks,
        completed_tasks,
        completion_percentage: percentage(completed_tasks, total_tasks),
        phases,
    }
}

// ============================================================================
// Progress analysis
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    OnTrack,
    Behind,
    Ahead,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Velocity {
    Slow,
    Normal,
    Fast,
}

impl Velocity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Velocity::Slow => "slow",
            Velocity::Normal => "normal",
            Velocity::Fast => "fast",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissedDay {
    pub day: u32,
    pub expected_date: Timestamp,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseProgress {
    pub phase_id: usize,
    pub phase_name: String,
    pub start_date: Timestamp,
    pub total_weeks: usize,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub expected_days_by_now: i64,
    pub actual_completed_days: i64,
    pub completion_percentage: f64,
    pub days_behind_schedule: i64,
    pub missed_days: Vec<MissedDay>,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OverallStats {
    pub total_phases: usize,
    pub completed_phases: usize,
    pub in_progress_phases: usize,
    pub pending_phases: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExpectedVsActual {
    pub expected_days: i64,
    pub actual_days: i64,
    pub ahead_behind: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressAnalysis {
    pub overall_stats: OverallStats,
    pub phase_details: Vec<PhaseProgress>,
    pub daily_completion_rate: f64,
    pub expected_vs_actual: ExpectedVsActual,
    pub learning_velocity: Velocity,
}

fn phase_progress(phase_id: usize, phase: &Phase, now: Timestamp) -> Option<PhaseProgress> {
    let plan = phase.learning_plan.as_ref()?;
    let start = plan.plan_meta.as_ref()?.generated_at;

    let total_tasks = plan.total_tasks();
    let completed_tasks = plan.completed_tasks();
    let days_since_start = (now - start).num_days().max(0);
    let expected = days_since_start.min(total_tasks as i64);
    let actual = completed_tasks as i64;
    let days_behind = (expected - actual).max(0);

    let missed_days = plan
        .tasks()
        .take(expected as usize)
        .enumerate()
        .filter(|(_, task)| !task.completed)
        .filter_map(|(i, _)| {
            let expected_date = start + Duration::days(i as i64);
            (expected_date < now).then(|| MissedDay {
                day: i as u32 + 1,
                expected_date,
                days_overdue: (now - expected_date).num_days(),
            })
        })
        .collect();

    let completion_percentage = percentage(completed_tasks, total_tasks);
    let status = if total_tasks > 0 && completed_tasks == total_tasks {
        PhaseStatus::Completed
    } else if days_behind > BEHIND_THRESHOLD_DAYS {
        PhaseStatus::Behind
    } else if actual > expected {
        PhaseStatus::Ahead
    } else if completion_percentage > 0.0 {
        PhaseStatus::OnTrack
    } else {
        PhaseStatus::Pending
    };

    Some(PhaseProgress {
        phase_id,
        phase_name: phase.name.clone(),
        start_date: start,
        total_weeks: plan.weekly_schedule.len(),
        total_tasks,
        completed_tasks,
        expected_days_by_now: expected,
        actual_completed_days: actual,
        completion_percentage,
        days_behind_schedule: days_behind,
        missed_days,
        status,
    })
}

/// Per-phase and overall progress of every phase that has a learning plan
pub fn analyze_progress(roadmap: &RoadmapDoc, now: Timestamp) -> ProgressAnalysis {
    let phase_details: Vec<PhaseProgress> = roadmap
        .phases
        .iter()
        .enumerate()
        .filter_map(|(i, phase)| phase_progress(i, phase, now))
        .collect();

    let mut overall = OverallStats {
        total_phases: roadmap.phases.len(),
        ..Default::default()
    };
    // Bucketed by completion, not schedule status: a late phase with
    // nothing done is still pending.
    for detail in &phase_details {
        if detail.completion_percentage >= 100.0 {
            overall.completed_phases += 1;
        } else if detail.completion_percentage > 0.0 {
            overall.in_progress_phases += 1;
        } else {
            overall.pending_phases += 1;
        }
    }

    let expected_days: i64 = phase_details.iter().map(|p| p.expected_days_by_now).sum();
    let actual_days: i64 = phase_details.iter().map(|p| p.actual_completed_days).sum();
    let total_tasks: u32 = phase_details.iter().map(|p| p.total_tasks).sum();
    let completed_tasks: u32 = phase_details.iter().map(|p| p.completed_tasks).sum();
    let daily_completion_rate = percentage(completed_tasks, total_tasks);

    let learning_velocity = if expected_days > 0 {
        let ratio = actual_days as f64 / expected_days as f64;
        if ratio >= FAST_VELOCITY_RATIO {
            Velocity::Fast
        } else if ratio <= SLOW_VELOCITY_RATIO {
            Velocity::Slow
        } else {
            Velocity::Normal
        }
    } else {
        Velocity::Normal
    };

    ProgressAnalysis {
        overall_stats: overall,
        phase_details,
        daily_completion_rate,
        expected_vs_actual: ExpectedVsActual {
            expected_days,
            actual_days,
            ahead_behind: actual_days - expected_days,
        },
        learning_velocity,
    }
}

// ============================================================================
// Delay detection
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_days_behind(days: i64) -> Self {
        match days {
            d if d <= 0 => RiskLevel::Low,
            1..=3 => RiskLevel::Medium,
            4..=7 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseDelay {
    pub phase_id: usize,
    pub phase_name: String,
    pub days_behind: i64,
    pub expected_by_now: i64,
    pub actually_completed: i64,
    pub longest_missed_streak: u32,
    pub start_date: Timestamp,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DelayAnalysis {
    pub total_days_behind: i64,
    pub phases_behind_schedule: Vec<PhaseDelay>,
    pub longest_streak_missed: u32,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<Recommendation>,
}

/// Longest run of consecutive missed day numbers
fn longest_streak(missed: &[MissedDay]) -> u32 {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<u32> = None;
    for day in missed.iter().map(|m| m.day) {
        current = match previous {
            Some(p) if p + 1 == day => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

fn recommendation(risk: RiskLevel, days_behind: i64) -> Recommendation {
    let (kind, title, description, action) = match risk {
        RiskLevel::Low => (
            "motivation",
            "Keep Up the Great Work! 🎉",
            "You're on track with your learning goals. Maintain this momentum!".to_string(),
            "Continue daily practice",
        ),
        RiskLevel::Medium => (
            "gentle_reminder",
            "Small Catch-Up Needed 📚",
            format!(
                "You're {} days behind schedule. A focused weekend can get you back on track!",
                days_behind
            ),
            "Dedicate 2-3 hours this weekend to catch up",
        ),
        RiskLevel::High => (
            "intensive_catchup",
            "Time for Intensive Catch-Up 🚀",
            format!(
                "You're {} days behind. Let's create a focused catch-up plan.",
                days_behind
            ),
            "Switch to accelerated learning mode for 1 week",
        ),
        RiskLevel::Critical => (
            "curriculum_adjustment",
            "Curriculum Adjustment Needed 🔄",
            format!(
                "You're {} days behind. Let's modify your learning path to focus on core concepts.",
                days_behind
            ),
            "Activate emergency catch-up mode with simplified curriculum",
        ),
    };
    Recommendation {
        kind: kind.to_string(),
        title: title.to_string(),
        description,
        action: action.to_string(),
    }
}

pub fn detect_delays(progress: &ProgressAnalysis) -> DelayAnalysis {
    let phases_behind_schedule: Vec<PhaseDelay> = progress
        .phase_details
        .iter()
        .filter(|p| p.days_behind_schedule > 0)
        .map(|p| PhaseDelay {
            phase_id: p.phase_id,
            phase_name: p.phase_name.clone(),
            days_behind: p.days_behind_schedule,
            expected_by_now: p.expected_days_by_now,
            actually_completed: p.actual_completed_days,
            longest_missed_streak: longest_streak(&p.missed_days),
            start_date: p.start_date,
        })
        .collect();

    let total_days_behind = phases_behind_schedule.iter().map(|p| p.days_behind).sum();
    let longest_streak_missed = phases_behind_schedule
        .iter()
        .map(|p| p.longest_missed_streak)
        .max()
        .unwrap_or(0);
    let risk_level = RiskLevel::from_days_behind(total_days_behind);

    DelayAnalysis {
        total_days_behind,
        phases_behind_schedule,
        longest_streak_missed,
        risk_level,
        recommendations: vec![recommendation(risk_level, total_days_behind)],
    }
}

// ============================================================================
// Adaptation
// ============================================================================

/// Adaptations warranted by the learner's velocity and delay
pub fn plan_adaptations(progress: &ProgressAnalysis, delays: &DelayAnalysis) -> Vec<Adaptation> {
    let mut adaptations = Vec::new();
    let behind = delays.total_days_behind;

    if progress.learning_velocity == Velocity::Slow || delays.risk_level >= RiskLevel::High {
        let additional_weeks = ((behind + STUDY_DAYS_PER_WEEK - 1) / STUDY_DAYS_PER_WEEK).max(1);
        adaptations.push(Adaptation::ExtendTimeline {
            additional_weeks: additional_weeks as u32,
            reason: "Extend daily learning time by 30 minutes".to_string(),
        });
        adaptations.push(Adaptation::SimplifyContent {
            reason: "Focus on core concepts, reduce advanced topics".to_string(),
        });
    } else if progress.learning_velocity == Velocity::Fast {
        adaptations.push(Adaptation::IncreaseChallenge {
            reason: "Add bonus challenges and advanced projects".to_string(),
        });
    }

    if behind > 0 {
        let days = behind as u32;
        adaptations.push(Adaptation::CatchUpPlan {
            days,
            hours: days * 2,
            reason: format!("Intensive {}-day catch-up program", days),
        });
    }

    adaptations
}

fn apply_to_flags(flags: &mut AdaptationFlags, adaptation: &Adaptation) {
    match adaptation {
        Adaptation::ExtendTimeline {
            additional_weeks, ..
        } => flags.extended_weeks = Some(*additional_weeks),
        Adaptation::SimplifyContent { .. } => {
            flags.content_simplified = true;
            flags.focus_mode = Some("core_concepts".to_string());
        }
        Adaptation::IncreaseChallenge { .. } => {
            flags.difficulty_increased = true;
            flags.bonus_content = true;
        }
        Adaptation::CatchUpPlan { days, hours, .. } => {
            flags.catch_up = Some(CatchUpPlan {
                days: *days,
                hours: *hours,
            });
        }
    }
}

/// Record adaptations on the roadmap: settings, plan flags and history.
///
/// An empty list leaves the roadmap untouched.
pub fn apply_adaptations(
    roadmap: &mut RoadmapDoc,
    adaptations: &[Adaptation],
    progress: &ProgressAnalysis,
    delays: &DelayAnalysis,
    now: Timestamp,
) -> bool {
    if adaptations.is_empty() {
        return false;
    }

    let count = roadmap
        .adaptive_settings
        .as_ref()
        .map(|s| s.adaptation_count)
        .unwrap_or(0);
    roadmap.adaptive_settings = Some(AdaptiveSettings {
        last_adaptation: now,
        adaptations_applied: adaptations.to_vec(),
        adaptation_count: count + 1,
    });

    for plan in roadmap
        .phases
        .iter_mut()
        .filter_map(|p| p.learning_plan.as_mut())
    {
        let flags = plan.adaptation_flags.get_or_insert_with(Default::default);
        for adaptation in adaptations {
            apply_to_flags(flags, adaptation);
        }
    }

    roadmap.adaptation_history.push(AdaptationRecord {
        timestamp: now,
        risk_level: delays.risk_level.as_str().to_string(),
        learning_velocity: progress.learning_velocity.as_str().to_string(),
        adaptations: adaptations.to_vec(),
    });
    roadmap.roadmap_meta.bump_version();
    true
}

/// Full result of an analysis run
#[derive(Debug, Clone, Serialize)]
pub struct AdaptationReport {
    pub progress_analysis: ProgressAnalysis,
    pub delay_analysis: DelayAnalysis,
    pub adaptations_applied: Vec<Adaptation>,
    pub adaptation_count: u32,
}

/// Analyze the user's current roadmap and persist any adaptations
pub async fn analyze_and_adapt(
    store: &Store,
    cache: &ResponseCache,
    user_id: &str,
) -> Result<AdaptationReport> {
    let mut current = roadmap::require_current(store, user_id).await?;
    let now = chrono::Utc::now();

    let progress = analyze_progress(&current, now);
    let delays = detect_delays(&progress);
    let adaptations = plan_adaptations(&progress, &delays);

    if apply_adaptations(&mut current, &adaptations, &progress, &delays, now) {
        roadmap::save(store, cache, &current).await?;
    }
    info!(
        "Adaptive analysis for {}: velocity {}, risk {}, {} adaptations",
        user_id,
        progress.learning_velocity.as_str(),
        delays.risk_level.as_str(),
        adaptations.len()
    );

    Ok(AdaptationReport {
        progress_analysis: progress,
        delay_analysis: delays,
        adaptation_count: current
            .adaptive_settings
            .as_ref()
            .map(|s| s.adaptation_count)
            .unwrap_or(0),
        adaptations_applied: adaptations,
    })
}
