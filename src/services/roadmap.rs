//! Roadmap generation.
//!
//! Level 1: Perplexity observes industry trends, Groq structures four phases.
//! Level 3 (optional): Perplexity observes learning resources, Groq merges
//! them into the phases. Each level falls back rather than failing:
//!
//! ```text
//! perplexity + groq -> groq only -> one-phase fallback
//! ```

use std::collections::{BTreeMap, BTreeSet};

use bson::doc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{parse, try_complete};
use crate::cache::{cache_key, CachePrefix, ResponseCache};
use crate::db::schemas::{
    AdaptationRecord, AdaptiveSettings, Phase, RoadmapDoc, RoadmapMeta, Timestamp,
};
use crate::db::Store;
use crate::llm::text::{clean_json_response, exceeds_token_limit, truncate_chars};
use crate::llm::{CompletionRequest, Providers};
use crate::types::{IgniteError, Result};

pub const SOURCE_MULTI_LEVEL: &str = "multi_level_perplexity";
pub const SOURCE_GROQ: &str = "groq";
pub const SOURCE_FALLBACK: &str = "fallback";

/// Combined prompt input above this estimate gets a shorter profile
pub const PROMPT_TOKEN_LIMIT: usize = 6000;

const OBSERVER_SYSTEM: &str = "You are an industry data observer with access to real-time information. Report current facts, trends, and data without analysis or reasoning. Focus on observing what IS happening in the industry right now.";

const RESOURCE_OBSERVER_SYSTEM: &str = "You are a learning resource observer. Report current, specific learning resources without analysis. Focus on what resources are actually available and recommended right now.";

pub(crate) const JSON_SYSTEM: &str = "You are a JSON response generator. Return ONLY valid JSON without any markdown formatting, explanations, or code blocks. Your response must start with { and end with }.";

const FORMATTING_REQUIREMENTS: &str = "CRITICAL FORMATTING REQUIREMENTS:
- Return ONLY valid JSON
- Do NOT include any explanatory text before or after the JSON
- Do NOT use markdown code blocks (no ```)
- Start directly with { and end with }
- Ensure all quotes are properly escaped
- Validate JSON structure before responding";

/// Phases plus the metadata describing how they were produced
#[derive(Debug, Clone)]
pub struct GeneratedRoadmap {
    pub phases: Vec<Phase>,
    pub meta: RoadmapMeta,
}

/// Groq request for a structuring prompt, with the JSON-only instructions appended
pub(crate) fn structuring_request(prompt: &str, max_tokens: u32) -> CompletionRequest {
    CompletionRequest::user(format!("{}\n\n{}", prompt, FORMATTING_REQUIREMENTS))
        .with_system(JSON_SYSTEM)
        .with_temperature(0.1)
        .with_max_tokens(max_tokens)
        .with_json_output()
}

/// The one-phase roadmap used when every provider fails
pub fn fallback_phases(career_goal: &str) -> Vec<Phase> {
    let mut resources = BTreeMap::new();
    resources.insert(
        "Online Courses".to_string(),
        vec!["Recommended courses".to_string()],
    );
    vec![Phase {
        name: format!("Getting Started with {}", career_goal),
        duration: "1-3 months".to_string(),
        description: format!("Learn the fundamentals of {}", career_goal),
        skills: vec!["Basic skills".to_string()],
        resources,
        learning_plan: None,
    }]
}

fn enhanced_with(multi_level: bool) -> BTreeMap<String, bool> {
    [
        ("level_1_perplexity_observe", multi_level),
        ("level_1_llama_reason", multi_level),
        ("level_2_detailed_tasks", false),
        ("level_3_enhanced_resources", false),
        ("industry_trends_integrated", multi_level),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn trends_query(career_goal: &str, profile_summary: &str) -> String {
    format!(
        "What are the current industry trends, job market demands, essential skills, and learning requirements for {goal} in 2025?

Observe and report factual data about:
- Most in-demand skills and technologies
- Current job market requirements
- Industry growth areas and opportunities
- Popular tools and platforms being used
- Recent developments and emerging trends
- Salary ranges and career progression paths
- Common career paths and specializations

Student background for context: {profile}

Provide factual, current information from reliable sources.",
        goal = career_goal,
        profile = truncate_chars(profile_summary, 300)
    )
}

fn structuring_prompt(career_goal: &str, profile_summary: &str, trends: &str) -> String {
    format!(
        r#"Create a structured learning roadmap for {goal} based on current industry trends.

STUDENT BACKGROUND:
{profile}

CURRENT INDUSTRY DATA:
{trends}

Create exactly 4 phases with this structure:
{{
    "phases": [
        {{
            "name": "Phase Name",
            "duration": "X-Y months",
            "description": "Description incorporating current trends",
            "skills": ["skill1", "skill2", "skill3"],
            "resources": {{
                "Online Courses": ["Course 1", "Course 2"],
                "Books": ["Book 1", "Book 2"],
                "Tools": ["Tool 1", "Tool 2"]
            }}
        }}
    ]
}}"#,
        goal = career_goal,
        profile = profile_summary,
        trends = truncate_chars(trends, 2000)
    )
}

fn groq_only_prompt(career_goal: &str) -> String {
    format!(
        r#"Create a structured learning roadmap for {goal} in this exact JSON format:
{{
    "phases": [
        {{
            "name": "Phase Name",
            "duration": "X-Y months",
            "description": "Brief description",
            "skills": ["skill1", "skill2", "skill3"],
            "resources": {{
                "Category1": ["Resource1", "Resource2"],
                "Category2": ["Resource3", "Resource4"],
                "Category3": ["Resource5", "Resource6"]
            }}
        }}
    ]
}}
Include exactly 4 phases. Return ONLY the JSON without any markdown formatting or code blocks."#,
        goal = career_goal
    )
}

fn parse_phases(raw: &str) -> Option<Vec<Phase>> {
    let value = serde_json::from_str::<serde_json::Value>(&clean_json_response(raw)).ok()?;
    parse::phases(&value)
}

async fn groq_only(providers: &Providers, career_goal: &str) -> Option<Vec<Phase>> {
    let request = CompletionRequest::user(groq_only_prompt(career_goal))
        .with_system("You are a technical expert. Respond with valid JSON only.")
        .with_temperature(0.1)
        .with_max_tokens(2000)
        .with_json_output();
    let reply = try_complete(providers.groq.as_ref(), "Groq roadmap", request).await?;
    let phases = parse_phases(&reply.content);
    if phases.is_none() {
        warn!("Groq roadmap reply was not a usable roadmap");
    }
    phases
}

async fn multi_level(
    providers: &Providers,
    career_goal: &str,
    profile_summary: &str,
) -> Option<Vec<Phase>> {
    let observe = CompletionRequest::user(trends_query(career_goal, profile_summary))
        .with_system(OBSERVER_SYSTEM)
        .with_temperature(0.1)
        .with_top_p(0.8)
        .with_max_tokens(2500)
        .with_search_focus("technical");
    let trends = try_complete(providers.perplexity.as_ref(), "Perplexity trends", observe)
        .await?
        .content;

    let combined = format!("Profile: {}\n\nIndustry Data: {}", profile_summary, trends);
    let profile = if exceeds_token_limit(&combined, PROMPT_TOKEN_LIMIT) {
        info!("Roadmap prompt too long, shortening profile");
        let mut short = truncate_chars(profile_summary, 500);
        if profile_summary.chars().count() > 500 {
            short.push_str("...");
        }
        short
    } else {
        profile_summary.to_string()
    };

    let request = structuring_request(&structuring_prompt(career_goal, &profile, &trends), 4000);
    let reply = try_complete(providers.groq.as_ref(), "Groq structuring", request).await?;
    let phases = parse_phases(&reply.content);
    if phases.is_none() {
        warn!("Structured roadmap reply could not be parsed");
    }
    phases
}

/// Generate roadmap phases for a career goal, falling back as needed
pub async fn generate(
    providers: &Providers,
    user_id: &str,
    career_goal: &str,
    profile_summary: &str,
) -> GeneratedRoadmap {
    let (phases, source) = match multi_level(providers, career_goal, profile_summary).await {
        Some(phases) => (phases, SOURCE_MULTI_LEVEL),
        None => match groq_only(providers, career_goal).await {
            Some(phases) => (phases, SOURCE_GROQ),
            None => (fallback_phases(career_goal), SOURCE_FALLBACK),
        },
    };
    info!("Generated {}-phase roadmap for {} from {}", phases.len(), user_id, source);

    let mut meta = RoadmapMeta::new(user_id, career_goal, source);
    meta.enhanced_with = enhanced_with(source == SOURCE_MULTI_LEVEL);
    GeneratedRoadmap { phases, meta }
}

fn resource_query(phases: &[Phase]) -> String {
    let topics: Vec<&str> = phases.iter().map(|p| p.name.as_str()).collect();
    let skills: BTreeSet<&str> = phases
        .iter()
        .flat_map(|p| p.skills.iter().map(String::as_str))
        .collect();
    format!(
        "What are the current best learning resources, tools, and materials available for these topics and skills in 2025?

LEARNING TOPICS: {}
KEY SKILLS: {}

Observe and report current information about:
- Top-rated online courses and platforms (with specific names)
- Recently published books and learning materials
- Current industry-standard tools and software
- Active practice platforms and coding challenges
- Valuable certifications and credentials
- Helpful communities and forums
- Free and paid learning options
- Mobile apps and learning tools

Focus on resources that are:
- Currently available and accessible
- Highly rated and recommended
- Updated for 2025 standards
- Suitable for different learning levels",
        topics.join(", "),
        skills.into_iter().collect::<Vec<_>>().join(", ")
    )
}

/// Level 3: refresh phase resources from current recommendations.
///
/// Returns true when the phases were updated. Phase names, skills and plans
/// are kept; only resource categories are taken from the model.
pub async fn enhance_resources(
    providers: &Providers,
    phases: &mut [Phase],
    meta: &mut RoadmapMeta,
) -> bool {
    if phases.is_empty() {
        return false;
    }

    let observe = CompletionRequest::user(resource_query(phases))
        .with_system(RESOURCE_OBSERVER_SYSTEM)
        .with_temperature(0.1)
        .with_top_p(0.8)
        .with_max_tokens(2500)
        .with_search_focus("educational");
    let Some(observed) = try_complete(providers.perplexity.as_ref(), "Perplexity resources", observe).await
    else {
        return false;
    };

    let roadmap_json = serde_json::to_string_pretty(&serde_json::json!({ "phases": &*phases }))
        .unwrap_or_default();
    let prompt = format!(
        "Enhance this roadmap with specific resources from the research data.

RESOURCE DATA:
{}

ROADMAP TO ENHANCE:
{}

Return the complete enhanced roadmap with improved resources.",
        truncate_chars(&observed.content, 2000),
        truncate_chars(&roadmap_json, 2000)
    );

    let Some(reply) =
        try_complete(providers.groq.as_ref(), "Groq resources", structuring_request(&prompt, 6000)).await
    else {
        return false;
    };
    let Some(enhanced) = parse_phases(&reply.content) else {
        warn!("Resource enhancement reply could not be parsed; keeping original resources");
        return false;
    };

    let mut changed = false;
    for (phase, update) in phases.iter_mut().zip(enhanced) {
        if !update.resources.is_empty() {
            phase.resources = update.resources;
            changed = true;
        }
    }
    if changed {
        meta.enhanced_with
            .insert("level_3_enhanced_resources".to_string(), true);
        meta.bump_version();
    }
    changed
}

/// Generate, optionally enhance, and store a new current roadmap
pub async fn create(
    store: &Store,
    providers: &Providers,
    cache: &ResponseCache,
    user_id: &str,
    career_goal: &str,
    profile_summary: &str,
    enhance: bool,
) -> Result<RoadmapDoc> {
    let GeneratedRoadmap { mut phases, mut meta } =
        generate(providers, user_id, career_goal, profile_summary).await;

    let enhanced = enhance && enhance_resources(providers, &mut phases, &mut meta).await;

    let mut roadmap = RoadmapDoc {
        user_id: user_id.to_string(),
        career_goal: career_goal.to_string(),
        phases,
        roadmap_meta: meta,
        created_at: Some(bson::DateTime::now()),
        ..Default::default()
    };
    roadmap._id = Some(store.roadmaps.insert_one(roadmap.clone()).await?);

    if enhanced {
        for (i, phase) in roadmap.phases.iter().enumerate() {
            store_resources(store, user_id, i as u32, phase).await?;
        }
    }

    cache.delete(&cache_key(CachePrefix::Roadmap, user_id, None)).await;
    Ok(roadmap)
}

async fn store_resources(store: &Store, user_id: &str, phase_id: u32, phase: &Phase) -> Result<()> {
    let categories = bson::to_bson(&phase.resources)?;
    store
        .resources
        .upsert_one(
            doc! { "user_id": user_id, "phase_id": phase_id },
            doc! {
                "user_id": user_id,
                "phase_id": phase_id,
                "categories": categories,
                "source": SOURCE_MULTI_LEVEL,
                "updated_at": bson::DateTime::now(),
            },
        )
        .await?;
    Ok(())
}

/// The user's newest roadmap
pub async fn current(store: &Store, user_id: &str) -> Result<Option<RoadmapDoc>> {
    store
        .roadmaps
        .find_latest(doc! { "user_id": user_id }, "created_at")
        .await
}

/// The user's newest roadmap, or 404
pub async fn require_current(store: &Store, user_id: &str) -> Result<RoadmapDoc> {
    current(store, user_id)
        .await?
        .ok_or_else(|| IgniteError::NotFound("No roadmap found. Generate one first.".into()))
}

/// Write back the mutable parts of a roadmap and drop its cached view
pub async fn save(store: &Store, cache: &ResponseCache, roadmap: &RoadmapDoc) -> Result<()> {
    let id = roadmap
        ._id
        .ok_or_else(|| IgniteError::Internal("Roadmap has no id".into()))?;

    let mut set = doc! {
        "phases": bson::to_bson(&roadmap.phases)?,
        "roadmap_meta": bson::to_bson(&roadmap.roadmap_meta)?,
        "adaptation_history": bson::to_bson(&roadmap.adaptation_history)?,
    };
    if let Some(settings) = &roadmap.adaptive_settings {
        set.insert("adaptive_settings", bson::to_bson(settings)?);
    }

    store
        .roadmaps
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;
    cache
        .delete(&cache_key(CachePrefix::Roadmap, &roadmap.user_id, None))
        .await;
    Ok(())
}

/// API view of a roadmap, with plain timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapView {
    pub id: Option<String>,
    pub user_id: String,
    pub career_goal: String,
    pub phases: Vec<Phase>,
    pub roadmap_meta: RoadmapMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive_settings: Option<AdaptiveSettings>,
    pub adaptation_history: Vec<AdaptationRecord>,
    pub created_at: Option<Timestamp>,
}

impl From<&RoadmapDoc> for RoadmapView {
    fn from(doc: &RoadmapDoc) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()),
            user_id: doc.user_id.clone(),
            career_goal: doc.career_goal.clone(),
            phases: doc.phases.clone(),
            roadmap_meta: doc.roadmap_meta.clone(),
            adaptive_settings: doc.adaptive_settings.clone(),
            adaptation_history: doc.adaptation_history.clone(),
            created_at: doc.created_at.map(|d| d.to_chrono()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmBackend, MockBackend};
    use std::sync::Arc;

    const ROADMAP_JSON: &str = r#"{"phases": [
        {"name": "Foundations", "duration": "1-2 months", "description": "Basics",
         "skills": ["Python"], "resources": {"Books": ["Think Python"]}},
        {"name": "Data", "duration": "2 months", "description": "Pandas",
         "skills": ["pandas"], "resources": ["Kaggle Learn"]},
        {"name": "ML", "duration": "3 months", "description": "Models",
         "skills": ["scikit-learn"], "resources": {}},
        {"name": "Portfolio", "duration": "1 month", "description": "Ship",
         "skills": ["Git"], "resources": {}}
    ]}"#;

    fn providers(groq: Option<MockBackend>, perplexity: Option<MockBackend>) -> Providers {
        Providers {
            groq: groq.map(|m| Arc::new(m) as Arc<dyn LlmBackend>),
            perplexity: perplexity.map(|m| Arc::new(m) as Arc<dyn LlmBackend>),
            bedrock: None,
        }
    }

    #[tokio::test]
    async fn test_multi_level_generation() {
        let groq = MockBackend::new("llama")
            .with_response(format!("Here is a roadmap:\n```json\n{}\n```", ROADMAP_JSON));
        let perplexity = MockBackend::new("sonar-pro").with_response("Python demand is up 20%.");
        let providers = providers(Some(groq), Some(perplexity));

        let roadmap = generate(&providers, "u1", "Data Scientist", "Student: Ada").await;
        assert_eq!(roadmap.phases.len(), 4);
        assert_eq!(roadmap.meta.source, SOURCE_MULTI_LEVEL);
        assert_eq!(roadmap.meta.version, "1.0");
        assert_eq!(roadmap.meta.enhanced_with["level_1_perplexity_observe"], true);
        assert_eq!(roadmap.meta.enhanced_with["level_3_enhanced_resources"], false);
        assert_eq!(roadmap.phases[1].resources["Resources"], vec!["Kaggle Learn"]);
    }

    #[tokio::test]
    async fn test_structuring_prompt_carries_trends() {
        let groq = Arc::new(MockBackend::new("llama").with_response(ROADMAP_JSON));
        let providers = Providers {
            groq: Some(groq.clone()),
            perplexity: Some(Arc::new(MockBackend::new("sonar").with_response("TRENDS-MARKER"))),
            bedrock: None,
        };

        generate(&providers, "u1", "Web Developer", "profile").await;
        let request = groq.last_request().unwrap();
        assert!(request.prompt().contains("TRENDS-MARKER"));
        assert!(request.prompt().contains("CRITICAL FORMATTING REQUIREMENTS"));
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(4000));
    }

    #[tokio::test]
    async fn test_groq_only_when_perplexity_missing() {
        let providers = providers(Some(MockBackend::new("llama").with_response(ROADMAP_JSON)), None);
        let roadmap = generate(&providers, "u1", "Data Scientist", "").await;
        assert_eq!(roadmap.meta.source, SOURCE_GROQ);
        assert_eq!(roadmap.meta.enhanced_with["industry_trends_integrated"], false);
    }

    #[tokio::test]
    async fn test_unparseable_replies_fall_back_to_single_phase() {
        let providers = providers(
            Some(MockBackend::new("llama").with_response("I cannot help with that")),
            Some(MockBackend::new("sonar").with_response("trends")),
        );
        let roadmap = generate(&providers, "u1", "Cloud Engineer", "").await;
        assert_eq!(roadmap.meta.source, SOURCE_FALLBACK);
        assert_eq!(roadmap.phases, fallback_phases("Cloud Engineer"));
        assert_eq!(roadmap.phases[0].name, "Getting Started with Cloud Engineer");
        assert_eq!(
            roadmap.meta.profile_hash,
            crate::db::schemas::profile_hash("u1", "Cloud Engineer")
        );
    }

    #[tokio::test]
    async fn test_enhance_resources_updates_categories_and_version() {
        let mut phases = parse_phases(ROADMAP_JSON).unwrap();
        let mut meta = RoadmapMeta::new("u1", "Data Scientist", SOURCE_MULTI_LEVEL);
        let enhanced = r#"{"phases": [{"name": "Foundations", "resources": {"Courses": ["CS50P"]}}]}"#;
        let providers = providers(
            Some(MockBackend::new("llama").with_response(enhanced)),
            Some(MockBackend::new("sonar").with_response("CS50P is popular")),
        );

        assert!(enhance_resources(&providers, &mut phases, &mut meta).await);
        assert_eq!(phases[0].resources["Courses"], vec!["CS50P"]);
        assert_eq!(phases[0].skills, vec!["Python"]);
        assert!(phases[1].resources.contains_key("Resources"));
        assert_eq!(meta.version, "1.1");
        assert_eq!(meta.enhanced_with["level_3_enhanced_resources"], true);
    }

    #[tokio::test]
    async fn test_enhance_resources_keeps_roadmap_on_failure() {
        let mut phases = fallback_phases("Go");
        let before = phases.clone();
        let mut meta = RoadmapMeta::new("u1", "Go", SOURCE_FALLBACK);
        let providers = providers(Some(MockBackend::new("llama")), None);

        assert!(!enhance_resources(&providers, &mut phases, &mut meta).await);
        assert_eq!(phases, before);
        assert_eq!(meta.version, "1.0");
    }
}
