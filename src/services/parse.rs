//! Lenient conversion of model JSON into roadmap structures.
//!
//! Models drift from the requested shape: durations come back as numbers,
//! resources as flat lists, phase names under `title`. Anything that still
//! carries the essential fields is accepted.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::db::schemas::{DailyTask, Phase, WeekPlan};

/// Category used when a model returns resources as a flat list
pub const DEFAULT_RESOURCE_CATEGORY: &str = "Resources";

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Strings from an array, or a single string promoted to a one-item list
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        Some(other) => text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Resource categories from a map, or a flat list under "Resources"
pub fn resource_map(value: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    match value {
        Some(Value::Object(categories)) => {
            for (category, items) in categories {
                let items = string_list(Some(items));
                if !items.is_empty() {
                    map.insert(category.clone(), items);
                }
            }
        }
        Some(other @ (Value::Array(_) | Value::String(_))) => {
            let items = string_list(Some(other));
            if !items.is_empty() {
                map.insert(DEFAULT_RESOURCE_CATEGORY.to_string(), items);
            }
        }
        _ => {}
    }
    map
}

fn phase(value: &Value) -> Option<Phase> {
    let name = value
        .get("name")
        .and_then(text)
        .or_else(|| value.get("title").and_then(text))?;

    Some(Phase {
        name,
        duration: value.get("duration").and_then(text).unwrap_or_default(),
        description: value.get("description").and_then(text).unwrap_or_default(),
        skills: string_list(value.get("skills")),
        resources: resource_map(value.get("resources")),
        learning_plan: None,
    })
}

/// Phases from a `{"phases": [...]}` object; `None` when none are usable
pub fn phases(value: &Value) -> Option<Vec<Phase>> {
    let parsed: Vec<Phase> = value
        .get("phases")?
        .as_array()?
        .iter()
        .filter_map(phase)
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

fn hours(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(2.0),
        Some(Value::String(s)) => s
            .split_whitespace()
            .next()
            .and_then(|h| h.parse::<f64>().ok())
            .unwrap_or(2.0),
        _ => 2.0,
    }
}

fn index_or(value: Option<&Value>, fallback: usize) -> u32 {
    value
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(fallback as u32)
}

fn daily_task(value: &Value, position: usize) -> Option<DailyTask> {
    let mut tasks = string_list(value.get("tasks"));
    if tasks.is_empty() {
        tasks = string_list(value.get("task"));
    }
    if tasks.is_empty() {
        return None;
    }

    Some(DailyTask {
        day: index_or(value.get("day"), position + 1),
        tasks,
        resources: string_list(value.get("resources")),
        duration_hours: hours(value.get("duration_hours")),
        ..Default::default()
    })
}

fn week(value: &Value, position: usize) -> Option<WeekPlan> {
    let daily_tasks: Vec<DailyTask> = value
        .get("daily_tasks")?
        .as_array()?
        .iter()
        .enumerate()
        .filter_map(|(i, task)| daily_task(task, i))
        .collect();
    if daily_tasks.is_empty() {
        return None;
    }

    let mut objectives = string_list(value.get("learning_objectives"));
    if objectives.is_empty() {
        objectives = string_list(value.get("objectives"));
    }

    Some(WeekPlan {
        week: index_or(value.get("week"), position + 1),
        learning_objectives: objectives,
        daily_tasks,
        assessment: value.get("assessment").and_then(text),
    })
}

/// Weeks from a `{"weekly_schedule": [...]}` object; `None` when none are usable
pub fn weekly_schedule(value: &Value) -> Option<Vec<WeekPlan>> {
    let parsed: Vec<WeekPlan> = value
        .get("weekly_schedule")?
        .as_array()?
        .iter()
        .enumerate()
        .filter_map(|(i, w)| week(w, i))
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phases_accept_drifted_shapes() {
        let value = json!({
            "phases": [
                {
                    "title": "Foundations",
                    "duration": 3,
                    "skills": ["Python", 42],
                    "resources": ["Automate the Boring Stuff", "CS50"]
                },
                {
                    "name": "Projects",
                    "duration": "2-3 months",
                    "description": "Build things",
                    "resources": {"Books": ["Clean Code"], "Empty": []}
                },
                {"description": "no name, dropped"}
            ]
        });

        let phases = phases(&value).unwrap();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].name, "Foundations");
        assert_eq!(phases[0].duration, "3");
        assert_eq!(phases[0].skills, vec!["Python", "42"]);
        assert_eq!(
            phases[0].resources.get(DEFAULT_RESOURCE_CATEGORY).unwrap(),
            &vec!["Automate the Boring Stuff".to_string(), "CS50".to_string()]
        );
        assert_eq!(phases[1].resources.len(), 1);
        assert!(phases[1].resources.contains_key("Books"));
    }

    #[test]
    fn test_phases_none_without_usable_entries() {
        assert!(phases(&json!({"phases": []})).is_none());
        assert!(phases(&json!({"roadmap": "text"})).is_none());
    }

    #[test]
    fn test_weekly_schedule_defaults() {
        let value = json!({
            "weekly_schedule": [
                {
                    "objectives": ["Variables"],
                    "daily_tasks": [
                        {"tasks": ["Read chapter 1"], "duration_hours": "3 hours"},
                        {"day": "2", "task": "Exercises"},
                        {"day": 3}
                    ],
                    "assessment": "Quiz"
                }
            ]
        });

        let weeks = weekly_schedule(&value).unwrap();
        assert_eq!(weeks[0].week, 1);
        assert_eq!(weeks[0].learning_objectives, vec!["Variables"]);
        assert_eq!(weeks[0].daily_tasks.len(), 2);
        assert_eq!(weeks[0].daily_tasks[0].day, 1);
        assert_eq!(weeks[0].daily_tasks[0].duration_hours, 3.0);
        assert_eq!(weeks[0].daily_tasks[1].day, 2);
        assert_eq!(weeks[0].daily_tasks[1].tasks, vec!["Exercises"]);
        assert_eq!(weeks[0].daily_tasks[1].duration_hours, 2.0);
        assert_eq!(weeks[0].assessment.as_deref(), Some("Quiz"));
    }

    #[test]
    fn test_out_of_range_indexes_fall_back_to_position() {
        let value = json!({
            "weekly_schedule": [
                {
                    "week": 4294967296u64,
                    "daily_tasks": [
                        {"day": u64::MAX, "tasks": ["Read"]},
                        {"day": "4294967297", "tasks": ["Write"]},
                        {"day": 7, "tasks": ["Review"]}
                    ]
                }
            ]
        });

        let weeks = weekly_schedule(&value).unwrap();
        assert_eq!(weeks[0].week, 1);
        let days: Vec<u32> = weeks[0].daily_tasks.iter().map(|t| t.day).collect();
        assert_eq!(days, vec![1, 2, 7]);
    }
}
