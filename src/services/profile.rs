//! Profile summaries for prompt personalization.
//!
//! A summary is built from the user document, the last fetched LinkedIn
//! profile and the current roadmap. It is kept for five minutes in process
//! and for the MEDIUM timeout in Redis.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bson::doc;
use dashmap::DashMap;
use tracing::debug;

use crate::cache::{cache_key, CachePrefix, ResponseCache, TimeoutClass};
use crate::db::schemas::{LinkedInProfile, UserDoc};
use crate::db::Store;
use crate::llm::text::{exceeds_token_limit, truncate_chars};
use crate::types::{IgniteError, Result};

/// In-process summary lifetime
pub const LOCAL_TTL: Duration = Duration::from_secs(300);

/// Summaries above this many estimated tokens are cut down
pub const MAX_SUMMARY_TOKENS: usize = 1000;

pub struct ProfileService {
    cache: Arc<ResponseCache>,
    local: DashMap<String, (Instant, String)>,
    ttl: Duration,
}

impl ProfileService {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self {
            cache,
            local: DashMap::new(),
            ttl: LOCAL_TTL,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Summary text for a user, from the nearest cache that has it
    pub async fn summary(&self, store: &Store, user_id: &str) -> Result<String> {
        if let Some(entry) = self.local.get(user_id) {
            let (stored_at, summary) = entry.value();
            if stored_at.elapsed() < self.ttl {
                return Ok(summary.clone());
            }
        }

        let key = cache_key(CachePrefix::ProfileSummary, user_id, None);
        if let Some(summary) = self.cache.get::<String>(&key).await {
            debug!("Profile summary cache hit for {}", user_id);
            self.local
                .insert(user_id.to_string(), (Instant::now(), summary.clone()));
            return Ok(summary);
        }

        let user = store
            .users
            .find_one(doc! { "user_id": user_id })
            .await?
            .ok_or_else(|| IgniteError::NotFound("User not found".into()))?;
        let linkedin = store
            .linkedin_profiles
            .find_one(doc! { "user_id": user_id })
            .await?
            .and_then(|doc| doc.profile);
        let phase_count = store
            .roadmaps
            .find_latest(doc! { "user_id": user_id }, "created_at")
            .await?
            .map(|r| r.phases.len())
            .unwrap_or(0);

        let summary = summary_text(&user, linkedin.as_ref(), phase_count);

        self.cache.set(&key, &summary, TimeoutClass::Medium).await;
        self.local
            .insert(user_id.to_string(), (Instant::now(), summary.clone()));
        Ok(summary)
    }

    /// Drop every cached entry for a user (called after profile updates)
    pub async fn invalidate(&self, user_id: &str) -> u64 {
        self.local.remove(user_id);
        self.cache.clear_user_cache(user_id).await
    }
}

fn push_field(parts: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        parts.push(format!("{}: {}", label, value));
    }
}

/// Compact profile text, one labeled line per known field
pub fn summary_text(user: &UserDoc, linkedin: Option<&LinkedInProfile>, phase_count: usize) -> String {
    let mut parts = Vec::new();

    push_field(&mut parts, "Student", Some(&user.name));
    push_field(&mut parts, "Career Goal", user.career_goal.as_deref());
    push_field(
        &mut parts,
        "Headline",
        user.headline
            .as_deref()
            .or(linkedin.map(|p| p.headline.as_str())),
    );
    push_field(
        &mut parts,
        "Location",
        user.location
            .as_deref()
            .or(linkedin.map(|p| p.location.as_str())),
    );

    let mut skills: Vec<&str> = user.skills.iter().map(String::as_str).collect();
    if let Some(profile) = linkedin {
        for skill in &profile.skills {
            if !skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
                skills.push(skill);
            }
        }
    }
    if !skills.is_empty() {
        let shown: Vec<&str> = skills.into_iter().take(10).collect();
        parts.push(format!("Key Skills: {}", shown.join(", ")));
    }

    if let Some(summary) = user
        .summary
        .as_deref()
        .or(linkedin.map(|p| p.summary.as_str()))
        .filter(|s| !s.trim().is_empty())
    {
        parts.push(format!("Summary: {}", truncate_chars(summary.trim(), 300)));
    }

    if let Some(profile) = linkedin {
        let titles: Vec<String> = profile
            .experience
            .iter()
            .filter_map(|e| e.get("title").and_then(|t| t.as_str()))
            .take(3)
            .map(str::to_string)
            .collect();
        if !titles.is_empty() {
            parts.push(format!("Experience: {}", titles.join(", ")));
        }

        let schools: Vec<String> = profile
            .education
            .iter()
            .filter_map(|e| {
                e.get("school")
                    .or_else(|| e.get("degree"))
                    .and_then(|s| s.as_str())
            })
            .take(2)
            .map(str::to_string)
            .collect();
        if !schools.is_empty() {
            parts.push(format!("Education: {}", schools.join(", ")));
        }
    }

    if phase_count > 0 {
        parts.push(format!("Learning Journey: {} phases planned", phase_count));
    }

    let summary = parts.join("\n");
    if exceeds_token_limit(&summary, MAX_SUMMARY_TOKENS) {
        truncate_chars(&summary, MAX_SUMMARY_TOKENS * 4)
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn user() -> UserDoc {
        let mut user = UserDoc::new(
            "u1".into(),
            "Ada".into(),
            "ada@example.com".into(),
            "hash".into(),
        );
        user.career_goal = Some("Data Scientist".into());
        user.skills = vec!["Python".into(), "SQL".into()];
        user
    }

    fn linkedin() -> LinkedInProfile {
        LinkedInProfile {
            name: "Ada L".into(),
            headline: "Analyst at Example".into(),
            location: "Toronto".into(),
            summary: "Loves numbers".into(),
            experience: vec![json!({"title": "Analyst"}), json!({"company": "no title"})],
            education: vec![json!({"school": "PBSC"})],
            skills: vec!["sql".into(), "Tableau".into()],
            certifications: Vec::new(),
            profile_url: String::new(),
            profile_picture: String::new(),
            connections_count: 10,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_from_user_only() {
        let text = summary_text(&user(), None, 0);
        assert_eq!(
            text,
            "Student: Ada\nCareer Goal: Data Scientist\nKey Skills: Python, SQL"
        );
    }

    #[test]
    fn test_summary_merges_linkedin_and_roadmap() {
        let text = summary_text(&user(), Some(&linkedin()), 4);
        assert!(text.contains("Headline: Analyst at Example"));
        assert!(text.contains("Location: Toronto"));
        assert!(text.contains("Key Skills: Python, SQL, Tableau"));
        assert!(text.contains("Summary: Loves numbers"));
        assert!(text.contains("Experience: Analyst"));
        assert!(text.contains("Education: PBSC"));
        assert!(text.ends_with("Learning Journey: 4 phases planned"));
    }

    #[test]
    fn test_long_summary_is_capped() {
        let mut user = user();
        user.skills = (0..10).map(|i| format!("skill-{}-{}", i, "x".repeat(600))).collect();
        let text = summary_text(&user, None, 0);
        assert!(text.chars().count() <= MAX_SUMMARY_TOKENS * 4);
    }
}
