//! Per-module AI tutoring.
//!
//! A tutor conversation is scoped to one week ("module") of a phase's
//! learning plan and stored under `phase_{p}_module_{m}`.

use std::collections::BTreeMap;
use std::time::Instant;

use bson::doc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{complete_or_error, roadmap, try_complete};
use crate::db::schemas::{session_id, ChatMessage, RoadmapDoc};
use crate::db::Store;
use crate::llm::citations::append_reference_links;
use crate::llm::text::truncate_chars;
use crate::llm::{CompletionRequest, Message, MessageRole, Providers};
use crate::types::{IgniteError, Result};

pub const CANNED_REPLY: &str = "I'm having trouble processing your question right now. Could you please try asking again? I'm here to help you learn! 🎓";

const BEDROCK_TUTOR_SYSTEM: &str = "You are LEO, an expert AI tutor specializing in personalized learning.
Your role is to:
1. Provide clear, detailed explanations
2. Break down complex concepts into simple steps
3. Use examples and analogies to aid understanding
4. Encourage critical thinking with thoughtful questions
5. Adapt your teaching style to the student's needs
Be patient, encouraging, and focus on helping students truly understand concepts.";

/// Reference links appended to a Perplexity reply
const MAX_REFERENCE_LINKS: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct TutorRequest {
    #[serde(default)]
    pub message: String,
    pub phase_id: u32,
    /// One-based week number within the phase's learning plan
    pub module_id: u32,
    /// `"bedrock"` selects the Claude tutoring path
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorReply {
    pub response: String,
    pub citations: Vec<String>,
    pub processing_time: String,
}

/// What the tutor knows about the module being studied
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleContext {
    pub topic: String,
    pub objectives: Vec<String>,
    pub skills: Vec<String>,
    pub resources: BTreeMap<String, Vec<String>>,
}

impl ModuleContext {
    fn resources_text(&self) -> String {
        self.resources
            .iter()
            .map(|(category, items)| format!("{}: {}\n", category, items.join(", ")))
            .collect()
    }
}

/// Build the tutoring context for week `module_id` (one-based) of a phase
pub fn module_context(roadmap: &RoadmapDoc, phase_id: usize, module_id: usize) -> Result<ModuleContext> {
    let phase = roadmap
        .phases
        .get(phase_id)
        .ok_or_else(|| IgniteError::BadRequest(format!("Invalid phase_id {}", phase_id)))?;
    let week = phase
        .learning_plan
        .as_ref()
        .and_then(|plan| plan.weekly_schedule.get(module_id.checked_sub(1)?))
        .ok_or_else(|| IgniteError::BadRequest(format!("Invalid module_id {}", module_id)))?;

    let mut resources = phase.resources.clone();
    let module_resources: Vec<String> = week
        .daily_tasks
        .iter()
        .flat_map(|t| t.resources.iter().cloned())
        .collect();
    if !module_resources.is_empty() {
        resources.insert("Module Resources".to_string(), module_resources);
    }

    let objectives = if week.learning_objectives.is_empty() {
        vec!["General learning".to_string()]
    } else {
        week.learning_objectives.clone()
    };
    let skills = if phase.skills.is_empty() {
        vec!["Fundamental skills".to_string()]
    } else {
        phase.skills.clone()
    };

    Ok(ModuleContext {
        topic: format!("{} - Week {}", phase.name, week.week),
        objectives,
        skills,
        resources,
    })
}

fn mentor_prompt(ctx: &ModuleContext, message: &str, history: &[ChatMessage], profile: &str) -> String {
    let recent: String = history
        .iter()
        .rev()
        .take(4)
        .rev()
        .map(|m| {
            let role = MessageRole::parse(&m.role).as_str();
            let mut title = role.to_string();
            if let Some(first) = title.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            format!("{}: {}\n", title, truncate_chars(&m.content, 120))
        })
        .collect();

    let profile_block = if profile.trim().is_empty() {
        String::new()
    } else {
        format!(
            "\nSTUDENT BACKGROUND & PROFILE:\n{}\n\nUse this context to personalize your teaching approach and examples.\n",
            truncate_chars(profile, 600)
        )
    };

    format!(
        "You are an AI Mentor 🎓 specializing in {topic}. You help students learn effectively with the most current, accurate, and well-sourced information available.
{profile_block}
LEARNING CONTEXT:
- Topic: {topic}
- Learning Objectives: {objectives}
- Key Skills to Develop: {skills}

AVAILABLE RESOURCES:
{resources}
RECENT CONVERSATION:
{recent}
STUDENT QUESTION: {message}

As an AI Mentor, provide comprehensive guidance with emphasis on current information:

📚 **Current Educational Content**: Use the latest learning approaches and industry-standard practices
🔄 **Latest Trends & Standards**: Reference current tools, frameworks, and best practices
💡 **Real-World Examples**: Provide current, practical examples from industry applications
🎯 **Up-to-Date Technologies**: Reference the latest versions, tools, and platforms in use
🌟 **Industry Insights**: Share current hiring trends and skill demands
🔍 **Evidence-Based Learning**: Cite current research and proven methodologies

Help the student learn {topic} with context about why it matters right now in the current market.",
        topic = ctx.topic,
        profile_block = profile_block,
        objectives = ctx.objectives.join(", "),
        skills = ctx.skills.join(", "),
        resources = ctx.resources_text(),
        recent = recent,
        message = message,
    )
}

fn groq_request(ctx: &ModuleContext, message: &str, history: &[ChatMessage]) -> CompletionRequest {
    let system = format!(
        "You are an AI tutor specializing in {topic}.

Current context:
- Topic: {topic}
- Learning Objectives: {objectives}
- Key Skills: {skills}

Available Resources:
{resources}
Provide educational, supportive responses that help students learn effectively.",
        topic = ctx.topic,
        objectives = ctx.objectives.join(", "),
        skills = ctx.skills.join(", "),
        resources = ctx.resources_text(),
    );

    let mut request = CompletionRequest {
        system_prompt: Some(system),
        ..Default::default()
    };
    let skip = history.len().saturating_sub(5);
    for m in &history[skip..] {
        request = request.with_message(Message {
            role: MessageRole::parse(&m.role),
            content: m.content.clone(),
        });
    }
    request
        .with_message(Message::user(message))
        .with_temperature(0.5)
        .with_max_tokens(1200)
}

/// Tutor reply through Perplexity, then Groq, then a canned apology
pub async fn mentor_reply(
    providers: &Providers,
    ctx: &ModuleContext,
    message: &str,
    history: &[ChatMessage],
    profile: &str,
) -> (String, Vec<String>) {
    let request = CompletionRequest::user(mentor_prompt(ctx, message, history, profile))
        .with_temperature(0.2)
        .with_top_p(0.9)
        .with_max_tokens(1400);
    if let Some(reply) = try_complete(providers.perplexity.as_ref(), "Perplexity mentor", request).await {
        let citations: Vec<String> = reply.citations.into_iter().take(MAX_REFERENCE_LINKS).collect();
        return (append_reference_links(&reply.content, &citations), citations);
    }

    debug!("Tutor falling back to Groq for '{}'", ctx.topic);
    match try_complete(providers.groq.as_ref(), "Groq tutor", groq_request(ctx, message, history)).await {
        Some(reply) => (reply.content.trim().to_string(), Vec::new()),
        None => (CANNED_REPLY.to_string(), Vec::new()),
    }
}

/// Claude tutoring through Bedrock; errors surface to the caller
pub async fn bedrock_reply(providers: &Providers, question: &str, context: &str) -> Result<String> {
    let prompt = format!(
        "Student Question: {}\nContext: {}\nProvide a comprehensive, helpful response that aids the student's learning.",
        question, context
    );
    let request = CompletionRequest::user(prompt)
        .with_system(BEDROCK_TUTOR_SYSTEM)
        .with_max_tokens(2048)
        .with_temperature(0.7);
    let reply = complete_or_error(providers.bedrock.as_ref(), "Bedrock", request).await?;
    Ok(reply.content)
}

async fn stored_messages(store: &Store, user_id: &str, session: &str) -> Result<Vec<ChatMessage>> {
    Ok(store
        .chat_history
        .find_one(doc! { "user_id": user_id, "session_id": session })
        .await?
        .map(|doc| doc.messages)
        .unwrap_or_default())
}

/// Answer a tutor question and append the exchange to the module's history
pub async fn chat(
    store: &Store,
    providers: &Providers,
    user_id: &str,
    profile: &str,
    request: &TutorRequest,
) -> Result<TutorReply> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(IgniteError::BadRequest("Message is required".into()));
    }
    let started = Instant::now();

    let current = roadmap::require_current(store, user_id).await?;
    let ctx = module_context(&current, request.phase_id as usize, request.module_id as usize)?;
    let session = session_id(request.phase_id, request.module_id);
    let mut messages = stored_messages(store, user_id, &session).await?;

    let (response, citations) = if request.provider.as_deref() == Some("bedrock") {
        let context = format!(
            "Topic: {}. Objectives: {}",
            ctx.topic,
            ctx.objectives.join(", ")
        );
        (bedrock_reply(providers, message, &context).await?, Vec::new())
    } else {
        let recent = &messages[messages.len().saturating_sub(10)..];
        mentor_reply(providers, &ctx, message, recent, profile).await
    };

    messages.push(ChatMessage::user(message));
    messages.push(ChatMessage::assistant(response.clone(), citations.clone()));
    store
        .chat_history
        .upsert_one(
            doc! { "user_id": user_id, "session_id": &session },
            doc! {
                "user_id": user_id,
                "session_id": &session,
                "messages": bson::to_bson(&messages)?,
                "timestamp": bson::DateTime::now(),
            },
        )
        .await?;

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "Tutor reply for {} in {} ({} messages, {:.2}s)",
        user_id,
        session,
        messages.len(),
        elapsed
    );

    Ok(TutorReply {
        response,
        citations,
        processing_time: format!("{:.2}s", elapsed),
    })
}

pub async fn history(store: &Store, user_id: &str, phase_id: u32, module_id: u32) -> Result<Vec<ChatMessage>> {
    stored_messages(store, user_id, &session_id(phase_id, module_id)).await
}

pub async fn clear_history(store: &Store, user_id: &str, phase_id: u32, module_id: u32) -> Result<()> {
    store
        .chat_history
        .update_one(
            doc! { "user_id": user_id, "session_id": session_id(phase_id, module_id) },
            doc! { "$set": { "messages": [] } },
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{DailyTask, LearningPlan, Phase, WeekPlan};
    use crate::llm::{LlmBackend, LlmError, MockBackend};
    use std::sync::Arc;

    fn roadmap() -> RoadmapDoc {
        let mut resources = BTreeMap::new();
        resources.insert("Books".to_string(), vec!["Fluent Python".to_string()]);
        RoadmapDoc {
            user_id: "u1".into(),
            phases: vec![Phase {
                name: "Python Basics".into(),
                skills: vec!["Python".into()],
                resources,
                learning_plan: Some(LearningPlan {
                    weekly_schedule: vec![
                        WeekPlan {
                            week: 1,
                            learning_objectives: vec!["Syntax".into()],
                            daily_tasks: vec![DailyTask {
                                day: 1,
                                tasks: vec!["Install".into()],
                                resources: vec!["python.org".into()],
                                ..Default::default()
                            }],
                            assessment: None,
                        },
                        WeekPlan {
                            week: 2,
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_module_context_is_one_based() {
        let ctx = module_context(&roadmap(), 0, 1).unwrap();
        assert_eq!(ctx.topic, "Python Basics - Week 1");
        assert_eq!(ctx.objectives, vec!["Syntax"]);
        assert_eq!(ctx.resources["Module Resources"], vec!["python.org"]);
        assert_eq!(ctx.resources["Books"], vec!["Fluent Python"]);

        let week2 = module_context(&roadmap(), 0, 2).unwrap();
        assert_eq!(week2.objectives, vec!["General learning"]);
        assert!(!week2.resources.contains_key("Module Resources"));
    }

    #[test]
    fn test_module_context_rejects_bad_indexes() {
        assert!(module_context(&roadmap(), 0, 0).is_err());
        assert!(module_context(&roadmap(), 0, 3).is_err());
        assert!(module_context(&roadmap(), 1, 1).is_err());
    }

    #[test]
    fn test_mentor_prompt_limits_context() {
        let ctx = module_context(&roadmap(), 0, 1).unwrap();
        let history: Vec<ChatMessage> = (0..6)
            .map(|i| ChatMessage::user(format!("question {} {}", i, "x".repeat(200))))
            .collect();
        let prompt = mentor_prompt(&ctx, "What is a list?", &history, &"p".repeat(1000));

        assert!(prompt.contains("STUDENT QUESTION: What is a list?"));
        assert!(!prompt.contains("question 1"));
        assert!(prompt.contains("User: question 2"));
        assert!(prompt.contains(&"p".repeat(600)));
        assert!(!prompt.contains(&"p".repeat(601)));
    }

    #[tokio::test]
    async fn test_perplexity_reply_gets_reference_links() {
        let ctx = module_context(&roadmap(), 0, 1).unwrap();
        let providers = Providers {
            perplexity: Some(Arc::new(
                MockBackend::new("sonar")
                    .with_response("Lists are ordered.")
                    .with_citations(vec!["https://docs.python.org/3/tutorial".into()]),
            ) as Arc<dyn LlmBackend>),
            ..Default::default()
        };

        let (text, citations) = mentor_reply(&providers, &ctx, "lists?", &[], "").await;
        assert!(text.starts_with("Lists are ordered."));
        assert!(text.contains("[1] [docs.python.org](https://docs.python.org/3/tutorial)"));
        assert_eq!(citations.len(), 1);
    }

    #[tokio::test]
    async fn test_groq_fallback_sends_recent_history() {
        let ctx = module_context(&roadmap(), 0, 1).unwrap();
        let failing = MockBackend::new("sonar");
        failing.push_error(LlmError::RateLimited { retry_after_ms: None });
        let groq = Arc::new(MockBackend::new("llama").with_response("Use append()."));
        let providers = Providers {
            perplexity: Some(Arc::new(failing) as Arc<dyn LlmBackend>),
            groq: Some(groq.clone()),
            bedrock: None,
        };
        let history: Vec<ChatMessage> = (0..8).map(|i| ChatMessage::user(format!("m{}", i))).collect();

        let (text, citations) = mentor_reply(&providers, &ctx, "lists?", &history, "").await;
        assert_eq!(text, "Use append().");
        assert!(citations.is_empty());

        let request = groq.last_request().unwrap();
        // five history messages plus the question
        assert_eq!(request.messages.len(), 6);
        assert_eq!(request.messages[0].content, "m3");
        assert!(request.system_prompt.unwrap().contains("Python Basics - Week 1"));
    }

    #[tokio::test]
    async fn test_no_provider_gives_canned_reply() {
        let ctx = module_context(&roadmap(), 0, 1).unwrap();
        let (text, _) = mentor_reply(&Providers::default(), &ctx, "q", &[], "").await;
        assert_eq!(text, CANNED_REPLY);
    }

    #[tokio::test]
    async fn test_bedrock_unconfigured_is_an_error() {
        assert!(bedrock_reply(&Providers::default(), "q", "c").await.is_err());
    }
}
