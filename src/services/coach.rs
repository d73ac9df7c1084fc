//! LEO career coach.

use std::time::Instant;

use bson::doc;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{complete_or_error, try_complete};
use crate::db::schemas::{CoachMessage, CoachSessionDoc, LinkedInProfile, UserDoc};
use crate::db::Store;
use crate::llm::citations::append_sources;
use crate::llm::text::{json_to_text, parse_json_reply, truncate_chars};
use crate::llm::{CompletionRequest, Providers};
use crate::types::{IgniteError, Result};

pub const CANNED_REPLY: &str = "Hey there! 👋🦁 I'm LEO, your career coach! I'm having some technical difficulties right now, but I'm still here to help you succeed. Could you try asking your question again? I'm committed to supporting your career journey! 🚀💪";

const JSON_FALLBACK_REPLY: &str = "Hey there! 👋 I'm LEO, your career coach. I had trouble putting my thoughts into words just now. Could you ask that again? I'm here to help! 🚀";

const COACH_MAX_TOKENS: u32 = 1500;

const PERPLEXITY_SYSTEM: &str = "You are LEO, a friendly career coach. Respond in natural conversational text format. Do NOT return JSON. Write as if you're having a friendly conversation.";

const GROQ_SYSTEM: &str = "You are LEO, a friendly career coach. Write in natural text format like a conversation. Never use JSON format. Write like you're texting a friend.";

const BEDROCK_CAREER_SYSTEM: &str = "You are a professional career coach with expertise in technology careers.
Your role is to:
1. Provide actionable career development advice
2. Suggest concrete steps for skill development
3. Offer industry insights and trends
4. Help identify growth opportunities
5. Guide professional networking strategies
Be professional, insightful, and focused on helping individuals achieve their career goals.";

/// Profile fields the coach prompt draws on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoachProfile {
    pub name: String,
    pub headline: String,
    pub summary: String,
    pub location: String,
    pub skills: String,
    pub career_goal: String,
}

fn pick(own: &Option<String>, theirs: Option<&str>) -> String {
    own.as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(theirs)
        .unwrap_or_default()
        .to_string()
}

impl CoachProfile {
    /// User fields first, LinkedIn fields where the user left a gap
    pub fn from_sources(user: &UserDoc, linkedin: Option<&LinkedInProfile>) -> Self {
        let skills = if user.skills.is_empty() {
            linkedin.map(|p| p.skills.join(", ")).unwrap_or_default()
        } else {
            user.skills.join(", ")
        };
        Self {
            name: user.name.clone(),
            headline: pick(&user.headline, linkedin.map(|p| p.headline.as_str())),
            summary: pick(&user.summary, linkedin.map(|p| p.summary.as_str())),
            location: pick(&user.location, linkedin.map(|p| p.location.as_str())),
            skills,
            career_goal: user.career_goal.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachReply {
    pub response: String,
    pub conversation_id: String,
    pub processing_time: String,
}

/// Coaching prompt with the profile and the last five exchanges
pub fn coaching_prompt(profile: &CoachProfile, question: &str, history: &[CoachMessage]) -> String {
    let skip = history.len().saturating_sub(5);
    let history_text: String = history[skip..]
        .iter()
        .map(|m| {
            format!(
                "User: {}\nBot: {}\n",
                truncate_chars(&m.prompt, 100),
                truncate_chars(&m.response, 100)
            )
        })
        .collect();

    format!(
        "CAREER COACHING CONVERSATION:

Student Profile:
- Name: {name}
- Professional Headline: {headline}
- Professional Summary: {summary}
- Location: {location}
- Skills: {skills}

Previous Chat History:
{history}
Current Student Question: \"{question}\"

Please provide personalized career coaching advice considering:
1. The student's background and skills
2. Current industry trends and job market
3. Specific career goals and aspirations
4. Practical next steps and recommendations",
        name = truncate_chars(&profile.name, 200),
        headline = truncate_chars(&profile.headline, 200),
        summary = truncate_chars(&profile.summary, 200),
        location = truncate_chars(&profile.location, 200),
        skills = truncate_chars(&profile.skills, 200),
        history = history_text,
        question = question,
    )
}

fn career_query(prompt: &str, profile_summary: &str) -> String {
    format!(
        "You are LEO 💜, a friendly career coach having a conversation. Respond in natural, conversational text format to this career question:

{prompt}

Student Context: {context}

Write a warm, encouraging response that includes:
- Current industry insights and job market trends
- Specific, actionable career advice
- Practical next steps
- Use emojis naturally
- Structure with bullet points and numbered lists in markdown

Keep the response conversational and under 350 words.",
        prompt = prompt,
        context = truncate_chars(profile_summary, 400),
    )
}

/// LEO reply through Perplexity, then Groq, then a canned message
pub async fn leo_reply(providers: &Providers, prompt: &str, profile_summary: &str) -> String {
    let request = CompletionRequest::user(career_query(prompt, profile_summary))
        .with_system(PERPLEXITY_SYSTEM)
        .with_temperature(0.6)
        .with_top_p(0.9)
        .with_max_tokens(COACH_MAX_TOKENS);
    if let Some(reply) = try_complete(providers.perplexity.as_ref(), "Perplexity LEO", request).await {
        let text = match parse_json_reply(&reply.content) {
            Some(value) => json_to_text(&value),
            None => reply.content.trim().to_string(),
        };
        return append_sources(&text, &reply.citations);
    }

    let request = CompletionRequest::user(prompt)
        .with_system(GROQ_SYSTEM)
        .with_temperature(0.7)
        .with_max_tokens(COACH_MAX_TOKENS / 2);
    match try_complete(providers.groq.as_ref(), "Groq LEO", request).await {
        Some(reply) if parse_json_reply(&reply.content).is_some() => {
            warn!("Groq LEO reply came back as JSON, using fallback text");
            JSON_FALLBACK_REPLY.to_string()
        }
        Some(reply) => reply.content.trim().to_string(),
        None => CANNED_REPLY.to_string(),
    }
}

/// Claude career advice through Bedrock; errors surface to the caller
pub async fn bedrock_advice(providers: &Providers, profile: &CoachProfile, question: &str) -> Result<String> {
    let prompt = format!(
        "User Profile: {}\nCareer Goal: {}\nSpecific Question: {}\nProvide professional career guidance tailored to this individual's goals and background.",
        serde_json::to_string(profile)?,
        profile.career_goal,
        question
    );
    let request = CompletionRequest::user(prompt)
        .with_system(BEDROCK_CAREER_SYSTEM)
        .with_max_tokens(2048)
        .with_temperature(0.7);
    Ok(complete_or_error(providers.bedrock.as_ref(), "Bedrock", request)
        .await?
        .content)
}

async fn load_profile(store: &Store, user_id: &str) -> Result<CoachProfile> {
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
    Ok(CoachProfile::from_sources(&user, linkedin.as_ref()))
}

/// Answer a coaching question and append the exchange to the conversation
pub async fn chat(
    store: &Store,
    providers: &Providers,
    user_id: &str,
    profile_summary: &str,
    question: &str,
    use_bedrock: bool,
) -> Result<CoachReply> {
    let question = question.trim();
    if question.is_empty() {
        return Err(IgniteError::BadRequest("Please enter a message before sending.".into()));
    }
    let started = Instant::now();

    let profile = load_profile(store, user_id).await?;
    let existing = store
        .coach_sessions
        .find_one(doc! { "user_id": user_id })
        .await?;
    let history = existing
        .as_ref()
        .map(CoachSessionDoc::sorted_messages)
        .unwrap_or_default();

    let response = if use_bedrock {
        bedrock_advice(providers, &profile, question).await?
    } else {
        let prompt = coaching_prompt(&profile, question, &history);
        leo_reply(providers, &prompt, profile_summary).await
    };

    let message = CoachMessage {
        prompt: question.to_string(),
        response: response.clone(),
        time: Utc::now(),
    };
    let conversation_id = match existing {
        Some(mut session) => {
            session.messages.push(message);
            let messages = session.sorted_messages();
            store
                .coach_sessions
                .update_one(
                    doc! { "user_id": user_id },
                    doc! { "$set": { "messages": bson::to_bson(&messages)? } },
                )
                .await?;
            session.conversation_id
        }
        None => {
            let mut session = CoachSessionDoc::new(user_id);
            session.messages.push(message);
            let conversation_id = session.conversation_id.clone();
            store.coach_sessions.insert_one(session).await?;
            conversation_id
        }
    };

    let elapsed = started.elapsed().as_secs_f64();
    info!("LEO reply for {} in {:.2}s", user_id, elapsed);
    Ok(CoachReply {
        response,
        conversation_id,
        processing_time: format!("{:.2}s", elapsed),
    })
}

/// Conversation exchanges, oldest first
pub async fn history(store: &Store, user_id: &str) -> Result<Vec<CoachMessage>> {
    Ok(store
        .coach_sessions
        .find_one(doc! { "user_id": user_id })
        .await?
        .map(|session| session.sorted_messages())
        .unwrap_or_default())
}

/// Delete the conversation; true when there was one
pub async fn clear(store: &Store, user_id: &str) -> Result<bool> {
    let result = store
        .coach_sessions
        .inner()
        .delete_one(doc! { "user_id": user_id })
        .await?;
    Ok(result.deleted_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmBackend, LlmError, MockBackend};
    use std::sync::Arc;

    fn profile() -> CoachProfile {
        CoachProfile {
            name: "Ada".into(),
            headline: "Student".into(),
            summary: "s".repeat(500),
            location: "Toronto".into(),
            skills: "Python, SQL".into(),
            career_goal: "Data Scientist".into(),
        }
    }

    fn exchange(i: usize) -> CoachMessage {
        CoachMessage {
            prompt: format!("question {}", i),
            response: format!("answer {} {}", i, "z".repeat(300)),
            time: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_caps_profile_and_history() {
        let history: Vec<_> = (0..7).map(exchange).collect();
        let prompt = coaching_prompt(&profile(), "How do I start?", &history);

        assert!(prompt.contains("Current Student Question: \"How do I start?\""));
        assert!(prompt.contains(&"s".repeat(200)));
        assert!(!prompt.contains(&"s".repeat(201)));
        assert!(!prompt.contains("question 1\n"));
        assert!(prompt.contains("User: question 2\n"));
        assert!(!prompt.contains(&"z".repeat(100)));
    }

    #[test]
    fn test_profile_prefers_user_fields() {
        let mut user = UserDoc::new("u1".into(), "Ada".into(), "a@x.io".into(), "h".into());
        user.headline = Some("  ".into());
        user.location = Some("Toronto".into());
        let linkedin = LinkedInProfile {
            name: "Ada L".into(),
            headline: "Analyst".into(),
            location: "Ottawa".into(),
            summary: String::new(),
            experience: Vec::new(),
            education: Vec::new(),
            skills: vec!["Excel".into()],
            certifications: Vec::new(),
            profile_url: String::new(),
            profile_picture: String::new(),
            connections_count: 0,
            fetched_at: Utc::now(),
        };
        let profile = CoachProfile::from_sources(&user, Some(&linkedin));
        assert_eq!(profile.headline, "Analyst");
        assert_eq!(profile.location, "Toronto");
        assert_eq!(profile.skills, "Excel");
    }

    #[tokio::test]
    async fn test_json_reply_is_rendered_with_sources() {
        let providers = Providers {
            perplexity: Some(Arc::new(
                MockBackend::new("sonar")
                    .with_response(r#"{"message": "Great question!", "nextSteps": ["Learn SQL"]}"#)
                    .with_citations(vec!["https://example.com/jobs".into()]),
            ) as Arc<dyn LlmBackend>),
            ..Default::default()
        };
        let reply = leo_reply(&providers, "prompt", "summary").await;
        assert!(reply.starts_with("Great question!"));
        assert!(reply.contains("- Learn SQL"));
        assert!(reply.ends_with("**Sources:** [1] https://example.com/jobs "));
    }

    #[tokio::test]
    async fn test_groq_fallback_halves_tokens() {
        let perplexity = MockBackend::new("sonar");
        perplexity.push_error(LlmError::Unauthorized);
        let groq = Arc::new(MockBackend::new("llama").with_response("Start with SQL! 🚀"));
        let providers = Providers {
            perplexity: Some(Arc::new(perplexity) as Arc<dyn LlmBackend>),
            groq: Some(groq.clone()),
            bedrock: None,
        };

        assert_eq!(leo_reply(&providers, "prompt", "").await, "Start with SQL! 🚀");
        let request = groq.last_request().unwrap();
        assert_eq!(request.max_tokens, Some(750));
        assert_eq!(request.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_groq_json_reply_is_replaced() {
        let providers = Providers {
            groq: Some(Arc::new(MockBackend::new("llama").with_response(r#"{"advice": "x"}"#))
                as Arc<dyn LlmBackend>),
            ..Default::default()
        };
        assert_eq!(leo_reply(&providers, "p", "").await, JSON_FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_no_provider_gives_canned_reply() {
        assert_eq!(leo_reply(&Providers::default(), "p", "").await, CANNED_REPLY);
    }
}
