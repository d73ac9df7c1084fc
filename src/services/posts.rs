//! LinkedIn post generation.
//!
//! Groq writes milestone, project and skill posts; assessment posts are always
//! templated. Each kind has a hashtag template used when Groq is absent or fails.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::try_complete;
use crate::llm::{CompletionRequest, Providers};

const POST_TEMPERATURE: f32 = 0.8;

const MILESTONE_SYSTEM: &str = "You are a professional LinkedIn content creator who writes engaging, authentic posts for career development and learning achievements.";
const PROJECT_SYSTEM: &str = "You are a professional LinkedIn content creator specializing in tech and project achievements.";
const SKILL_SYSTEM: &str = "You are a LinkedIn content creator focused on skill development and career growth.";
const ACHIEVEMENT_SYSTEM: &str = "You are a professional LinkedIn content creator. Write engaging, authentic posts that celebrate learning achievements.";

/// What to write about, as posted to `/social/generate_post`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PostRequest {
    Milestone {
        achievement: Option<String>,
        #[serde(default)]
        skills: Vec<String>,
        duration: Option<String>,
        tone: Option<String>,
    },
    Project {
        project_name: Option<String>,
        #[serde(default)]
        technologies: Vec<String>,
        achievements: Option<String>,
        learnings: Option<String>,
        domain: Option<String>,
    },
    Skill {
        #[serde(default)]
        skills: Vec<String>,
        application: Option<String>,
        next_steps: Option<String>,
        domain: Option<String>,
    },
    Assessment {
        assessment_type: Option<String>,
        score: Option<Value>,
        #[serde(default)]
        topics: Vec<String>,
    },
}

impl PostRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            PostRequest::Milestone { .. } => "milestone",
            PostRequest::Project { .. } => "project",
            PostRequest::Skill { .. } => "skill",
            PostRequest::Assessment { .. } => "assessment",
        }
    }
}

fn or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value.as_deref().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn list_or(items: &[String], default: &str) -> String {
    if items.is_empty() {
        default.to_string()
    } else {
        items.join(", ")
    }
}

fn milestone_template(achievement: &str, career_goal: &str, skills: &[String]) -> String {
    format!(
        "Excited to share my recent progress! 🎯

I've {achievement} as part of my journey toward {career_goal}.

Key skills developed: {skills}

This experience has reinforced my commitment to continuous learning and professional growth.

#LearningJourney #ProfessionalDevelopment #SkillBuilding #CareerGrowth",
        achievement = achievement,
        career_goal = career_goal,
        skills = list_or(skills, "valuable skills"),
    )
}

fn project_template(project_name: &str, technologies: &[String], domain: &str) -> String {
    format!(
        "Thrilled to announce the completion of {project_name}! 🚀

Technologies used: {technologies}

Key achievements:
• Built practical solutions to real-world problems
• Strengthened technical skills through hands-on development
• Gained valuable experience in {domain}

Every project is a learning opportunity and a step forward in my career journey.

#ProjectCompletion #TechSkills #SoftwareDevelopment #BuildInPublic",
        project_name = project_name,
        technologies = list_or(technologies, "various technologies"),
        domain = domain,
    )
}

fn skill_template(skills: &[String], career_goal: &str, domain: &str) -> String {
    format!(
        "Excited to share that I've been expanding my skillset! 🚀

I've recently learned {skills}, which aligns with my goal of {career_goal}.

Key takeaways:
• Hands-on practice with real-world applications
• Problem-solving in {domain}
• Building practical expertise

Always learning, always growing! 💡

#ProfessionalDevelopment #SkillBuilding #ContinuousLearning #CareerGrowth",
        skills = skills.join(", "),
        career_goal = career_goal,
        domain = domain,
    )
}

fn assessment_post(assessment_type: &str, score: &str, topics: &[String], career_goal: &str) -> String {
    format!(
        "Proud to share that I've completed the {assessment_type}! ✅

Score: {score}
Focus Areas: {topics}

This assessment challenged me to:
• Apply theoretical knowledge to practical scenarios
• Demonstrate problem-solving skills
• Showcase technical expertise

Each assessment is a step forward in my journey toward {career_goal}.

#LearningJourney #SkillValidation #ProfessionalGrowth #CareerDevelopment",
        assessment_type = assessment_type,
        score = score,
        topics = list_or(topics, "Multiple topics"),
        career_goal = career_goal,
    )
}

fn score_text(score: &Option<Value>) -> String {
    match score {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "successfully".to_string(),
    }
}

async fn groq_post(providers: &Providers, system: &str, prompt: String, max_tokens: u32) -> Option<String> {
    let request = CompletionRequest::user(prompt)
        .with_system(system)
        .with_temperature(POST_TEMPERATURE)
        .with_max_tokens(max_tokens);
    try_complete(providers.groq.as_ref(), "Groq post", request)
        .await
        .map(|reply| reply.content.trim().to_string())
}

/// Write a post for `user_name`, falling back to the kind's template
pub async fn generate(
    providers: &Providers,
    user_name: &str,
    career_goal: Option<&str>,
    request: &PostRequest,
) -> String {
    let goal = career_goal.filter(|g| !g.is_empty());
    let post = match request {
        PostRequest::Milestone {
            achievement,
            skills,
            duration,
            tone,
        } => {
            let achievement = or(achievement, "Completed a learning milestone");
            let goal = goal.unwrap_or("Career development");
            let prompt = format!(
                "Generate a compelling LinkedIn post for {user_name} who just achieved the following milestone:

Achievement: {achievement}
Career Goal: {goal}
Skills Learned: {skills}
Duration: {duration}

Tone: {tone}

The post should:
1. Be engaging and authentic (150-200 words)
2. Highlight the achievement and skills gained
3. Show enthusiasm and growth mindset
4. Include relevant hashtags (3-5)
5. Encourage professional connections
6. NOT use emojis excessively

Format: Just the post text, ready to publish.",
                user_name = user_name,
                achievement = achievement,
                goal = goal,
                skills = skills.join(", "),
                duration = or(duration, "Recently"),
                tone = or(tone, "professional"),
            );
            match groq_post(providers, MILESTONE_SYSTEM, prompt, 400).await {
                Some(post) => post,
                None => milestone_template(achievement, career_goal.unwrap_or("career excellence"), skills),
            }
        }
        PostRequest::Project {
            project_name,
            technologies,
            achievements,
            learnings,
            domain,
        } => {
            let prompt = format!(
                "Generate a LinkedIn post for {user_name} who completed a project:

Project: {project}
Technologies Used: {technologies}
Key Achievements: {achievements}
Learning Outcomes: {learnings}

The post should:
1. Showcase technical skills and growth
2. Be specific about what was built/learned
3. Demonstrate problem-solving abilities
4. Include relevant tech hashtags
5. Be approximately 200 words

Format: Just the post text, ready to publish.",
                user_name = user_name,
                project = or(project_name, "Learning Project"),
                technologies = technologies.join(", "),
                achievements = or(achievements, "Successfully completed"),
                learnings = or(learnings, "Valuable skills gained"),
            );
            match groq_post(providers, PROJECT_SYSTEM, prompt, 450).await {
                Some(post) => post,
                None => project_template(
                    or(project_name, "a new project"),
                    technologies,
                    or(domain, "software development"),
                ),
            }
        }
        PostRequest::Skill {
            skills,
            application,
            next_steps,
            domain,
        } => {
            let goal = goal.unwrap_or("Professional development");
            let prompt = format!(
                "Generate a LinkedIn post for {user_name} who learned new skills:

New Skills: {skills}
Career Goal: {goal}
Application: {application}
Next Steps: {next_steps}

Create an engaging post (150-180 words) that shows enthusiasm for learning and professional growth.
Include 3-4 relevant hashtags.",
                user_name = user_name,
                skills = skills.join(", "),
                goal = goal,
                application = or(application, "Real-world projects"),
                next_steps = or(next_steps, "Continuing to learn"),
            );
            match groq_post(providers, SKILL_SYSTEM, prompt, 350).await {
                Some(post) => post,
                None => skill_template(skills, career_goal.unwrap_or("professional growth"), or(domain, "my field")),
            }
        }
        PostRequest::Assessment {
            assessment_type,
            score,
            topics,
        } => assessment_post(
            or(assessment_type, "Assessment"),
            &score_text(score),
            topics,
            goal.unwrap_or("career excellence"),
        ),
    };
    info!("Generated {} post ({} chars)", request.kind(), post.chars().count());
    post
}

/// Achievement shared from the assessment flow
#[derive(Debug, Clone, Deserialize)]
pub struct AchievementPost {
    #[serde(rename = "type", default = "default_achievement_type")]
    pub achievement_type: String,
    #[serde(default = "default_phase_name")]
    pub phase_name: String,
    #[serde(default = "default_day")]
    pub day: u32,
    #[serde(default = "default_score")]
    pub score: u32,
    #[serde(default)]
    pub user_name: Option<String>,
}

fn default_achievement_type() -> String {
    "task_completion".to_string()
}

fn default_phase_name() -> String {
    "Learning Phase".to_string()
}

fn default_day() -> u32 {
    1
}

fn default_score() -> u32 {
    85
}

impl AchievementPost {
    pub fn fallback_text(&self) -> String {
        format!(
            "🎉 Just completed Day {} assessment in {} with {}%! #Learning #Achievement",
            self.day, self.phase_name, self.score
        )
    }

    fn prompt(&self, user_name: &str) -> String {
        if self.achievement_type == "assessment_passed" {
            format!(
                "Create a professional LinkedIn post for someone who just passed an assessment.

Details:
- User: {}
- Course: {}
- Day: {}
- Score: {}%

Requirements:
- Professional but enthusiastic tone
- Include relevant emojis
- Add 3-5 relevant hashtags
- Keep it under 300 characters
- Sound authentic and personal
- Include learning insights

Write the complete LinkedIn post:",
                user_name, self.phase_name, self.day, self.score
            )
        } else {
            format!(
                "Create a professional LinkedIn post for someone who completed a learning task.

Details:
- User: {}
- Course: {}
- Day: {}

Requirements:
- Professional but enthusiastic tone
- Include relevant emojis
- Add 3-5 relevant hashtags
- Keep it under 300 characters
- Sound authentic and personal

Write the complete LinkedIn post:",
                user_name, self.phase_name, self.day
            )
        }
    }
}

/// Short achievement post from Groq, or the one-line fallback
pub async fn achievement_text(providers: &Providers, achievement: &AchievementPost, user_name: &str) -> String {
    let name = achievement.user_name.as_deref().unwrap_or(user_name);
    let request = CompletionRequest::user(achievement.prompt(name))
        .with_system(ACHIEVEMENT_SYSTEM)
        .with_temperature(0.7)
        .with_max_tokens(200);
    try_complete(providers.groq.as_ref(), "Groq achievement post", request)
        .await
        .map(|reply| {
            reply
                .content
                .replace('"', "")
                .replace("Here's the LinkedIn post:", "")
                .trim()
                .to_string()
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| achievement.fallback_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockBackend};
    use serde_json::json;
    use std::sync::Arc;

    fn groq(mock: MockBackend) -> Providers {
        Providers {
            groq: Some(Arc::new(mock)),
            ..Default::default()
        }
    }

    #[test]
    fn test_post_request_parsing() {
        let request: PostRequest = serde_json::from_value(json!({
            "type": "project",
            "project_name": "Weather CLI",
            "technologies": ["Rust", "reqwest"]
        }))
        .unwrap();
        assert_eq!(request.kind(), "project");

        let request: PostRequest = serde_json::from_value(json!({"type": "assessment", "score": 92})).unwrap();
        assert!(matches!(request, PostRequest::Assessment { score: Some(_), .. }));

        assert!(serde_json::from_value::<PostRequest>(json!({"type": "poem"})).is_err());
    }

    #[tokio::test]
    async fn test_milestone_uses_groq() {
        let mock = Arc::new(MockBackend::new("llama").with_response("  Finished module one! #Learning  "));
        let providers = Providers {
            groq: Some(mock.clone()),
            ..Default::default()
        };
        let request = PostRequest::Milestone {
            achievement: Some("Finished Python basics".into()),
            skills: vec!["Python".into()],
            duration: None,
            tone: Some("excited".into()),
        };

        let post = generate(&providers, "Ada", Some("Data Scientist"), &request).await;
        assert_eq!(post, "Finished module one! #Learning");

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.temperature, Some(0.8));
        assert_eq!(sent.max_tokens, Some(400));
        assert!(sent.prompt().contains("Tone: excited"));
        assert!(sent.prompt().contains("Career Goal: Data Scientist"));
    }

    #[tokio::test]
    async fn test_templates_when_groq_fails() {
        let mock = MockBackend::new("llama");
        mock.push_error(LlmError::RateLimited { retry_after_ms: None });
        let providers = groq(mock);
        let request = PostRequest::Project {
            project_name: Some("Weather CLI".into()),
            technologies: vec![],
            achievements: None,
            learnings: None,
            domain: None,
        };
        let post = generate(&providers, "Ada", None, &request).await;
        assert!(post.starts_with("Thrilled to announce the completion of Weather CLI! 🚀"));
        assert!(post.contains("Technologies used: various technologies"));
        assert!(post.ends_with("#BuildInPublic"));

        let request = PostRequest::Milestone {
            achievement: None,
            skills: vec![],
            duration: None,
            tone: None,
        };
        let post = generate(&Providers::default(), "Ada", None, &request).await;
        assert!(post.contains("I've Completed a learning milestone as part of my journey toward career excellence."));
    }

    #[tokio::test]
    async fn test_assessment_posts_skip_groq() {
        let mock = Arc::new(MockBackend::new("llama").with_response("should not be used"));
        let providers = Providers {
            groq: Some(mock.clone()),
            ..Default::default()
        };
        let request = PostRequest::Assessment {
            assessment_type: Some("Python Quiz".into()),
            score: Some(json!(88)),
            topics: vec!["Loops".into()],
        };
        let post = generate(&providers, "Ada", Some("Backend Engineer"), &request).await;
        assert!(post.starts_with("Proud to share that I've completed the Python Quiz! ✅"));
        assert!(post.contains("Score: 88"));
        assert!(post.contains("toward Backend Engineer."));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_achievement_text_fallback_and_cleanup() {
        let achievement: AchievementPost =
            serde_json::from_value(json!({"type": "assessment_passed", "phase_name": "Python", "day": 3, "score": 90}))
                .unwrap();
        assert_eq!(
            achievement_text(&Providers::default(), &achievement, "Ada").await,
            "🎉 Just completed Day 3 assessment in Python with 90%! #Learning #Achievement"
        );

        let providers = groq(MockBackend::new("llama").with_response("Here's the LinkedIn post: \"Passed Day 3! 🚀\""));
        assert_eq!(achievement_text(&providers, &achievement, "Ada").await, "Passed Day 3! 🚀");
    }
}
