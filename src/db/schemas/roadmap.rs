//! Roadmap document schema
//!
//! A roadmap is always stored as a structured document: phases, their
//! learning plans, and the per-task completion and assessment records.

use std::collections::BTreeMap;

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for roadmaps
pub const ROADMAP_COLLECTION: &str = "roadmaps";

/// Timestamp type used inside roadmap sub-documents
pub type Timestamp = chrono::DateTime<Utc>;

/// Roadmap document stored in MongoDB (one current roadmap per user, newest wins)
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RoadmapDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub career_goal: String,

    #[serde(default)]
    pub phases: Vec<Phase>,

    pub roadmap_meta: RoadmapMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_settings: Option<AdaptiveSettings>,

    #[serde(default)]
    pub adaptation_history: Vec<AdaptationRecord>,

    #[serde(default)]
    pub created_at: Option<DateTime>,
}

/// One phase of a roadmap
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Phase {
    pub name: String,

    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Resource category -> items
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_plan: Option<LearningPlan>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LearningPlan {
    #[serde(default)]
    pub weekly_schedule: Vec<WeekPlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_meta: Option<LearningPlanMeta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptation_flags: Option<AdaptationFlags>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WeekPlan {
    pub week: u32,

    #[serde(default)]
    pub learning_objectives: Vec<String>,

    #[serde(default)]
    pub daily_tasks: Vec<DailyTask>,

    /// Description of the end-of-week assessment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DailyTask {
    pub day: u32,

    #[serde(default)]
    pub tasks: Vec<String>,

    #[serde(default)]
    pub resources: Vec<String>,

    #[serde(default)]
    pub duration_hours: f64,

    /// `w{week}_d{day}`
    #[serde(default)]
    pub task_id: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<Timestamp>,

    #[serde(default)]
    pub completion_history: Vec<CompletionEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompletionEvent {
    pub completed: bool,
    pub timestamp: Timestamp,
}

/// Latest assessment result recorded on a daily task
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AssessmentRecord {
    pub assessment_type: String,
    pub score: u32,
    pub passed: bool,
    pub completed: bool,
    pub attempts: u32,
    pub last_attempt: Timestamp,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LearningPlanMeta {
    pub generated_at: Timestamp,
    pub enhancement_level: String,
    pub total_weeks: u32,
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub progress_percentage: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RoadmapMeta {
    pub generated_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: String,
    #[serde(default)]
    pub enhanced_with: BTreeMap<String, bool>,
    pub source: String,
    pub profile_hash: String,
}

impl Default for RoadmapMeta {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            generated_at: now,
            updated_at: now,
            version: "1.0".to_string(),
            enhanced_with: BTreeMap::new(),
            source: String::new(),
            profile_hash: String::new(),
        }
    }
}

/// Settings written when adaptations are applied to a roadmap
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AdaptiveSettings {
    pub last_adaptation: Timestamp,
    pub adaptations_applied: Vec<Adaptation>,
    pub adaptation_count: u32,
}

/// Flags written on a learning plan by an adaptation
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AdaptationFlags {
    #[serde(default)]
    pub content_simplified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<String>,

    #[serde(default)]
    pub difficulty_increased: bool,

    #[serde(default)]
    pub bonus_content: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_weeks: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_up: Option<CatchUpPlan>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CatchUpPlan {
    pub days: u32,
    pub hours: u32,
}

/// A single adaptation recommended or applied to a roadmap
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adaptation {
    ExtendTimeline { additional_weeks: u32, reason: String },
    SimplifyContent { reason: String },
    IncreaseChallenge { reason: String },
    CatchUpPlan { days: u32, hours: u32, reason: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AdaptationRecord {
    pub timestamp: Timestamp,
    pub risk_level: String,
    pub learning_velocity: String,
    pub adaptations: Vec<Adaptation>,
}

impl RoadmapMeta {
    pub fn new(user_id: &str, career_goal: &str, source: &str) -> Self {
        Self {
            source: source.to_string(),
            profile_hash: profile_hash(user_id, career_goal),
            ..Default::default()
        }
    }

    /// Bump the minor version ("1.0" -> "1.1") and touch `updated_at`
    pub fn bump_version(&mut self) {
        self.version = bump_minor(&self.version);
        self.updated_at = Utc::now();
    }
}

/// md5 of `{user_id}_{career_goal}`, used to tell whether a roadmap matches the profile
pub fn profile_hash(user_id: &str, career_goal: &str) -> String {
    format!("{:x}", md5::compute(format!("{}_{}", user_id, career_goal)))
}

fn bump_minor(version: &str) -> String {
    match version.split_once('.') {
        Some((major, minor)) => match (major.parse::<u32>(), minor.parse::<u32>()) {
            (Ok(major), Ok(minor)) => format!("{}.{}", major, minor + 1),
            _ => "1.1".to_string(),
        },
        None => match version.parse::<u32>() {
            Ok(major) => format!("{}.1", major),
            Err(_) => "1.1".to_string(),
        },
    }
}

impl LearningPlan {
    pub fn total_tasks(&self) -> u32 {
        self.weekly_schedule
            .iter()
            .map(|w| w.daily_tasks.len() as u32)
            .sum()
    }

    pub fn completed_tasks(&self) -> u32 {
        self.tasks().filter(|t| t.completed).count() as u32
    }

    /// All daily tasks in schedule order
    pub fn tasks(&self) -> impl Iterator<Item = &DailyTask> {
        self.weekly_schedule.iter().flat_map(|w| w.daily_tasks.iter())
    }

    /// Reset every task to its initial tracking state and number it
    pub fn initialize_tasks(&mut self) {
        for week in &mut self.weekly_schedule {
            let week_number = week.week;
            for task in &mut week.daily_tasks {
                task.completed = false;
                task.completed_date = None;
                task.completion_history.clear();
                task.task_id = format!("w{}_d{}", week_number, task.day);
            }
        }
    }

    /// Recompute completed count and percentage on the plan meta
    pub fn refresh_progress(&mut self) {
        let total = self.total_tasks();
        let completed = self.completed_tasks();
        if let Some(meta) = self.plan_meta.as_mut() {
            meta.total_tasks = total;
            meta.completed_tasks = completed;
            meta.progress_percentage = percentage(completed, total);
        }
    }
}

/// Percentage rounded to one decimal place; zero when there is nothing to count
pub fn percentage(done: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 1000.0).round() / 10.0
}

impl IntoIndexes for RoadmapDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "created_at": -1 },
                Some(IndexOptions::builder().name("created_at_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for RoadmapDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(day: u32, completed: bool) -> DailyTask {
        DailyTask {
            day,
            completed,
            ..Default::default()
        }
    }

    #[test]
    fn test_bump_minor() {
        assert_eq!(bump_minor("1.0"), "1.1");
        assert_eq!(bump_minor("1.9"), "1.10");
        assert_eq!(bump_minor("2"), "2.1");
        assert_eq!(bump_minor("garbage"), "1.1");
    }

    #[test]
    fn test_profile_hash_is_md5_of_user_and_goal() {
        // md5("u1_Data Scientist")
        let hash = profile_hash("u1", "Data Scientist");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, format!("{:x}", md5::compute("u1_Data Scientist")));
        assert_ne!(hash, profile_hash("u1", "Web Developer"));
    }

    #[test]
    fn test_initialize_tasks_assigns_ids() {
        let mut plan = LearningPlan {
            weekly_schedule: vec![
                WeekPlan {
                    week: 1,
                    daily_tasks: vec![task(1, true), task(2, false)],
                    ..Default::default()
                },
                WeekPlan {
                    week: 2,
                    daily_tasks: vec![task(1, true)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        plan.initialize_tasks();

        let ids: Vec<_> = plan.tasks().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["w1_d1", "w1_d2", "w2_d1"]);
        assert_eq!(plan.completed_tasks(), 0);
        assert_eq!(plan.total_tasks(), 3);
    }

    #[test]
    fn test_refresh_progress_rounds_to_one_decimal() {
        let mut plan = LearningPlan {
            weekly_schedule: vec![WeekPlan {
                week: 1,
                daily_tasks: vec![task(1, true), task(2, false), task(3, false)],
                ..Default::default()
            }],
            plan_meta: Some(LearningPlanMeta {
                generated_at: Utc::now(),
                enhancement_level: "level_2".into(),
                total_weeks: 1,
                total_tasks: 3,
                completed_tasks: 0,
                progress_percentage: 0.0,
            }),
            adaptation_flags: None,
        };
        plan.refresh_progress();
        let meta = plan.plan_meta.unwrap();
        assert_eq!(meta.completed_tasks, 1);
        assert_eq!(meta.progress_percentage, 33.3);
    }

    fn full_roadmap() -> RoadmapDoc {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();

        let mut resources = BTreeMap::new();
        resources.insert("Books".to_string(), vec!["Think Python".to_string()]);

        let catch_up = Adaptation::CatchUpPlan {
            days: 4,
            hours: 8,
            reason: "4 days behind".into(),
        };

        RoadmapDoc {
            _id: None,
            metadata: Metadata::default(),
            user_id: "u1".into(),
            career_goal: "Data Scientist".into(),
            phases: vec![Phase {
                name: "Python Basics".into(),
                duration: "1-2 months".into(),
                description: "Core syntax".into(),
                skills: vec!["Python".into()],
                resources,
                learning_plan: Some(LearningPlan {
                    weekly_schedule: vec![WeekPlan {
                        week: 1,
                        learning_objectives: vec!["Variables".into()],
                        daily_tasks: vec![DailyTask {
                            day: 1,
                            tasks: vec!["Install Python".into()],
                            resources: vec!["python.org".into()],
                            duration_hours: 1.5,
                            task_id: "w1_d1".into(),
                            completed: true,
                            completed_date: Some(at),
                            completion_history: vec![CompletionEvent {
                                completed: true,
                                timestamp: at,
                            }],
                            assessment: Some(AssessmentRecord {
                                assessment_type: "theory".into(),
                                score: 85,
                                passed: true,
                                completed: true,
                                attempts: 2,
                                last_attempt: at,
                            }),
                        }],
                        assessment: Some("Weekly quiz".into()),
                    }],
                    plan_meta: Some(LearningPlanMeta {
                        generated_at: at,
                        enhancement_level: "level_2".into(),
                        total_weeks: 1,
                        total_tasks: 1,
                        completed_tasks: 1,
                        progress_percentage: 100.0,
                    }),
                    adaptation_flags: Some(AdaptationFlags {
                        content_simplified: true,
                        focus_mode: Some("core_concepts".into()),
                        extended_weeks: Some(1),
                        catch_up: Some(CatchUpPlan { days: 4, hours: 8 }),
                        ..Default::default()
                    }),
                }),
            }],
            roadmap_meta: RoadmapMeta {
                generated_at: at,
                updated_at: at,
                version: "1.2".into(),
                enhanced_with: BTreeMap::from([("level_3_enhanced_resources".to_string(), true)]),
                source: "multi_level_perplexity".into(),
                profile_hash: profile_hash("u1", "Data Scientist"),
            },
            adaptive_settings: Some(AdaptiveSettings {
                last_adaptation: at,
                adaptations_applied: vec![catch_up.clone()],
                adaptation_count: 1,
            }),
            adaptation_history: vec![AdaptationRecord {
                timestamp: at,
                risk_level: "medium".into(),
                learning_velocity: "slow".into(),
                adaptations: vec![catch_up],
            }],
            created_at: Some(DateTime::from_millis(1_772_443_800_000)),
        }
    }

    #[test]
    fn test_roadmap_round_trips_through_bson_as_structure() {
        let roadmap = full_roadmap();
        let stored = bson::to_document(&roadmap).unwrap();

        let phases = stored.get_array("phases").unwrap();
        assert_eq!(phases.len(), 1);
        let phase = phases[0].as_document().unwrap();
        assert!(phase.get_document("learning_plan").is_ok());
        assert!(stored.get_document("roadmap_meta").is_ok());
        assert!(stored.get_array("adaptation_history").is_ok());

        let loaded: RoadmapDoc = bson::from_document(stored).unwrap();
        assert_eq!(loaded.user_id, roadmap.user_id);
        assert_eq!(loaded.career_goal, roadmap.career_goal);
        assert_eq!(loaded.phases, roadmap.phases);
        assert_eq!(loaded.roadmap_meta, roadmap.roadmap_meta);
        assert_eq!(loaded.adaptive_settings, roadmap.adaptive_settings);
        assert_eq!(loaded.adaptation_history, roadmap.adaptation_history);
        assert_eq!(loaded.created_at, roadmap.created_at);
    }

    #[test]
    fn test_adaptation_serializes_with_type_tag() {
        let value = serde_json::to_value(Adaptation::CatchUpPlan {
            days: 3,
            hours: 6,
            reason: "behind".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "catch_up_plan");
        assert_eq!(value["hours"], 6);
    }
}
