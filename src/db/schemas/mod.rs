//! Database schemas for PBSC Ignite
//!
//! One typed document per collection. `DATA_COLLECTIONS` lists the collections
//! `ignite-db init` creates; the untyped `config` collection is created by the
//! `system_config` upsert.

mod achievement;
mod assessment;
mod chat;
mod coach;
mod linkedin;
mod metadata;
mod progress;
mod resource;
mod roadmap;
mod social;
mod user;

pub use achievement::{AchievementDoc, ACHIEVEMENT_COLLECTION};
pub use assessment::{AssessmentDoc, Evaluation, ASSESSMENT_COLLECTION};
pub use chat::{session_id, ChatHistoryDoc, ChatMessage, CHAT_HISTORY_COLLECTION};
pub use coach::{CoachMessage, CoachSessionDoc, COACH_SESSION_COLLECTION};
pub use linkedin::{LinkedInProfile, LinkedInProfileDoc, SharePreferences, LINKEDIN_PROFILE_COLLECTION};
pub use metadata::{to_chrono, Metadata};
pub use progress::{ProgressDoc, PROGRESS_COLLECTION};
pub use resource::{ResourceDoc, RESOURCE_COLLECTION};
pub use roadmap::{
    percentage, profile_hash, Adaptation, AdaptationFlags, AdaptationRecord, AdaptiveSettings,
    AssessmentRecord, CatchUpPlan, CompletionEvent, DailyTask, LearningPlan, LearningPlanMeta,
    Phase, RoadmapDoc, RoadmapMeta, Timestamp, WeekPlan, ROADMAP_COLLECTION,
};
pub use social::{PostStatus, SocialPostDoc, SOCIAL_POST_COLLECTION};
pub use user::{UserDoc, UserProfile, USER_COLLECTION};

/// Collection holding the `system_config` document
pub const CONFIG_COLLECTION: &str = "config";

/// Collections holding application data
pub const DATA_COLLECTIONS: [&str; 10] = [
    USER_COLLECTION,
    ROADMAP_COLLECTION,
    ASSESSMENT_COLLECTION,
    CHAT_HISTORY_COLLECTION,
    COACH_SESSION_COLLECTION,
    LINKEDIN_PROFILE_COLLECTION,
    PROGRESS_COLLECTION,
    RESOURCE_COLLECTION,
    SOCIAL_POST_COLLECTION,
    ACHIEVEMENT_COLLECTION,
];
