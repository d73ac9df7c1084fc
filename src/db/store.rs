//! Typed collection handles opened once at startup

use crate::db::schemas::*;
use crate::db::{MongoClient, MongoCollection};
use crate::types::IgniteError;

/// Every application collection, indexed and ready for use.
///
/// Cloning is cheap: the driver handles are reference counted.
#[derive(Clone)]
pub struct Store {
    pub client: MongoClient,
    pub users: MongoCollection<UserDoc>,
    pub roadmaps: MongoCollection<RoadmapDoc>,
    pub assessments: MongoCollection<AssessmentDoc>,
    pub chat_history: MongoCollection<ChatHistoryDoc>,
    pub coach_sessions: MongoCollection<CoachSessionDoc>,
    pub linkedin_profiles: MongoCollection<LinkedInProfileDoc>,
    pub progress: MongoCollection<ProgressDoc>,
    pub resources: MongoCollection<ResourceDoc>,
    pub social_posts: MongoCollection<SocialPostDoc>,
    pub achievements: MongoCollection<AchievementDoc>,
}

impl Store {
    /// Open every collection, applying its indexes
    pub async fn open(client: MongoClient) -> Result<Self, IgniteError> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            roadmaps: client.collection(ROADMAP_COLLECTION).await?,
            assessments: client.collection(ASSESSMENT_COLLECTION).await?,
            chat_history: client.collection(CHAT_HISTORY_COLLECTION).await?,
            coach_sessions: client.collection(COACH_SESSION_COLLECTION).await?,
            linkedin_profiles: client.collection(LINKEDIN_PROFILE_COLLECTION).await?,
            progress: client.collection(PROGRESS_COLLECTION).await?,
            resources: client.collection(RESOURCE_COLLECTION).await?,
            social_posts: client.collection(SOCIAL_POST_COLLECTION).await?,
            achievements: client.collection(ACHIEVEMENT_COLLECTION).await?,
            client,
        })
    }

    pub async fn ping(&self) -> bool {
        self.client.ping().await.is_ok()
    }
}
