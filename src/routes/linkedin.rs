//! LinkedIn routes
//!
//! Connection state and sharing preferences live in `linkedin_profiles`;
//! everything that touches LinkedIn itself goes through Unipile.

use bson::{doc, Bson, Document};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{AchievementDoc, LinkedInProfileDoc, PostStatus, SharePreferences, SocialPostDoc};
use crate::db::Store;
use crate::routes::social::{user_name, PostView};
use crate::routes::{
    error_json, json_response, method_not_allowed, ok_json, parse_json_body, require_store,
    AuthUser, BoxBody,
};
use crate::server::AppState;
use crate::services::posts::{self, AchievementPost};
use crate::services::unipile::{is_valid_linkedin_url, mask_account_id};
use crate::types::{IgniteError, Result};

/// Most recent posts returned by posts-history
const POSTS_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct LinkedInStatus {
    pub connected: bool,
    pub status: String,
    pub profile_url: Option<String>,
    pub auto_sharing: bool,
    /// `***` plus the last four characters
    pub account_id: Option<String>,
    pub connected_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub profile_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    pub auto_sharing: bool,
    pub share_assessments: bool,
    pub share_milestones: bool,
    pub share_projects: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub auto_sharing: Option<bool>,
    pub share_assessments: Option<bool>,
    pub share_milestones: Option<bool>,
    pub share_projects: Option<bool>,
}

impl PreferencesUpdate {
    fn to_set(&self) -> Document {
        let mut set = Document::new();
        let fields = [
            ("auto_sharing", self.auto_sharing),
            ("share_preferences.share_assessments", self.share_assessments),
            ("share_preferences.share_milestones", self.share_milestones),
            ("share_preferences.share_projects", self.share_projects),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                set.insert(field, value);
            }
        }
        set
    }
}

impl From<Option<&LinkedInProfileDoc>> for Preferences {
    fn from(doc: Option<&LinkedInProfileDoc>) -> Self {
        let share = doc.map(|d| d.share_preferences.clone()).unwrap_or_default();
        Self {
            auto_sharing: doc.is_some_and(|d| d.auto_sharing),
            share_assessments: share.share_assessments,
            share_milestones: share.share_milestones,
            share_projects: share.share_projects,
        }
    }
}

pub async fn handle_linkedin_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let response = match (method, rest) {
        (Method::GET, "status") => status(state, user).await,
        (Method::POST, "connect") => connect(req, state, user).await,
        (Method::GET, "preferences") => preferences(state, user).await,
        (Method::POST, "preferences") => update_preferences(req, state, user).await,
        (Method::POST, "disconnect") => disconnect(state, user).await,
        (Method::POST, "fetch-profile") => fetch_profile(state, user).await,
        (Method::POST, "publish-achievement") => publish_achievement(req, state, user).await,
        (Method::GET, "posts-history") => posts_history(state, user).await,
        (
            _,
            "status" | "connect" | "preferences" | "disconnect" | "fetch-profile"
            | "publish-achievement" | "posts-history",
        ) => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

pub(crate) async fn connection(store: &Store, user_id: &str) -> Result<Option<LinkedInProfileDoc>> {
    store.linkedin_profiles.find_one(doc! { "user_id": user_id }).await
}

/// The user's connection, or 400 when no account is connected
pub(crate) async fn require_connection(store: &Store, user_id: &str) -> Result<(LinkedInProfileDoc, String)> {
    let doc = connection(store, user_id)
        .await?
        .filter(LinkedInProfileDoc::is_connected)
        .ok_or_else(|| IgniteError::BadRequest("LinkedIn account not connected".into()))?;
    let account_id = doc.account_id.clone().unwrap_or_default();
    Ok((doc, account_id))
}

/// GET /api/linkedin/status
async fn status(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let doc = crate::try_service!(connection(store, &user.user_id).await);

    let body = match doc {
        Some(doc) => LinkedInStatus {
            connected: doc.is_connected(),
            status: if doc.status.is_empty() {
                "disconnected".to_string()
            } else {
                doc.status.clone()
            },
            profile_url: doc.profile_url.clone(),
            auto_sharing: doc.auto_sharing,
            account_id: doc.account_id.as_deref().map(mask_account_id),
            connected_at: doc.connected_at.map(|d| d.to_chrono()),
        },
        None => LinkedInStatus {
            connected: false,
            status: "disconnected".to_string(),
            profile_url: None,
            auto_sharing: false,
            account_id: None,
            connected_at: None,
        },
    };
    ok_json(&body)
}

/// POST /api/linkedin/connect
async fn connect(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: ConnectRequest = crate::try_service!(parse_json_body(req).await);
    let account_id = body.account_id.trim();
    if account_id.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "account_id is required", Some("BAD_REQUEST"));
    }
    let profile_url = body
        .profile_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    if let Some(url) = profile_url {
        if !is_valid_linkedin_url(url) {
            return error_json(
                StatusCode::BAD_REQUEST,
                "Invalid LinkedIn profile URL",
                Some("INVALID_URL"),
            );
        }
    }

    let store = crate::try_response!(require_store(&state));
    let mut set = doc! {
        "user_id": &user.user_id,
        "account_id": account_id,
        "status": "connected",
        "connected_at": bson::DateTime::now(),
    };
    if let Some(url) = profile_url {
        set.insert("profile_url", url);
    }
    crate::try_service!(
        store
            .linkedin_profiles
            .upsert_one(doc! { "user_id": &user.user_id }, set)
            .await
    );

    info!("LinkedIn account {} connected for {}", mask_account_id(account_id), user.user_id);
    ok_json(&json!({
        "success": true,
        "message": "LinkedIn account connected",
        "account_id": mask_account_id(account_id),
    }))
}

/// GET /api/linkedin/preferences
async fn preferences(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let doc = crate::try_service!(connection(store, &user.user_id).await);
    ok_json(&Preferences::from(doc.as_ref()))
}

/// POST /api/linkedin/preferences
async fn update_preferences(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let update: PreferencesUpdate = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    let mut set = update.to_set();
    if !set.is_empty() {
        set.insert("user_id", &user.user_id);
        if crate::try_service!(connection(store, &user.user_id).await).is_none() {
            set.insert("status", "disconnected");
            let defaults = crate::try_service!(bson::to_bson(&SharePreferences::default()).map_err(IgniteError::from));
            if let Bson::Document(defaults) = defaults {
                for (key, value) in defaults {
                    let path = format!("share_preferences.{}", key);
                    if !set.contains_key(&path) {
                        set.insert(path, value);
                    }
                }
            }
        }
        crate::try_service!(
            store
                .linkedin_profiles
                .upsert_one(doc! { "user_id": &user.user_id }, set)
                .await
        );
    }

    let doc = crate::try_service!(connection(store, &user.user_id).await);
    ok_json(&Preferences::from(doc.as_ref()))
}

/// POST /api/linkedin/disconnect
async fn disconnect(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let doc = crate::try_service!(connection(store, &user.user_id).await);
    let Some(doc) = doc else {
        return ok_json(&json!({ "success": true, "message": "No LinkedIn account connected" }));
    };

    if let Some(account_id) = doc.account_id.as_deref().filter(|a| !a.is_empty()) {
        if state.unipile.is_configured() {
            if let Err(e) = state.unipile.disconnect(account_id).await {
                warn!("Unipile disconnect failed for {}: {}", user.user_id, e);
            }
        }
    }

    crate::try_service!(
        store
            .linkedin_profiles
            .update_one(
                doc! { "user_id": &user.user_id },
                doc! { "$set": {
                    "account_id": Bson::Null,
                    "profile_url": Bson::Null,
                    "connected_at": Bson::Null,
                    "status": "disconnected",
                    "auto_sharing": false,
                } },
            )
            .await
    );

    info!("LinkedIn disconnected for {}", user.user_id);
    ok_json(&json!({ "success": true, "message": "LinkedIn account disconnected" }))
}

/// POST /api/linkedin/fetch-profile
async fn fetch_profile(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let (_, account_id) = crate::try_service!(require_connection(store, &user.user_id).await);

    let profile = crate::try_service!(state.unipile.profile(&account_id).await);
    let stored = crate::try_service!(bson::to_bson(&profile).map_err(IgniteError::from));
    crate::try_service!(
        store
            .linkedin_profiles
            .update_one(
                doc! { "user_id": &user.user_id },
                doc! { "$set": { "profile": stored, "fetched_at": bson::DateTime::now() } },
            )
            .await
    );
    state.profiles.invalidate(&user.user_id).await;

    info!("Fetched LinkedIn profile for {}", user.user_id);
    ok_json(&json!({ "success": true, "profile": profile }))
}

/// POST /api/linkedin/publish-achievement
async fn publish_achievement(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let achievement: AchievementPost = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));
    let (_, account_id) = crate::try_service!(require_connection(store, &user.user_id).await);

    let name = crate::try_service!(user_name(store, &user.user_id).await);
    let text = posts::achievement_text(&state.providers, &achievement, &name).await;
    let published = crate::try_service!(state.unipile.post(&account_id, &text, None).await);

    let details = json!({
        "type": &achievement.achievement_type,
        "phase_name": &achievement.phase_name,
        "day": achievement.day,
        "score": achievement.score,
    });
    let posted_at = bson::DateTime::from_chrono(published.posted_at);
    crate::try_service!(
        store
            .social_posts
            .insert_one(SocialPostDoc {
                user_id: user.user_id.clone(),
                post_content: text.clone(),
                post_type: "achievement".to_string(),
                status: PostStatus::Published,
                details: details.clone(),
                post_id: published.post_id.clone(),
                post_url: published.post_url.clone(),
                posted_at: Some(posted_at),
                created_at: Some(posted_at),
                ..Default::default()
            })
            .await
    );
    crate::try_service!(
        store
            .achievements
            .insert_one(AchievementDoc::new(
                &user.user_id,
                "assessment_shared",
                format!("Shared Day {} achievement", achievement.day),
                format!("Shared progress in {} on LinkedIn", achievement.phase_name),
                details,
            ))
            .await
    );

    info!("Published achievement post for {}", user.user_id);
    json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "post_id": published.post_id,
            "post_url": published.post_url,
            "posted_at": published.posted_at,
            "content": text,
        }),
    )
}

/// GET /api/linkedin/posts-history
async fn posts_history(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let docs = crate::try_service!(
        store
            .social_posts
            .find_sorted(
                doc! { "user_id": &user.user_id },
                doc! { "created_at": -1 },
                Some(POSTS_HISTORY_LIMIT),
            )
            .await
    );
    let posts: Vec<PostView> = docs.iter().map(PostView::from).collect();
    ok_json(&json!({ "posts": posts, "total": posts.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_default_when_never_connected() {
        let prefs = Preferences::from(None::<&LinkedInProfileDoc>);
        assert!(!prefs.auto_sharing);
        assert!(prefs.share_assessments && prefs.share_milestones && prefs.share_projects);
    }

    #[test]
    fn test_preferences_update_uses_dotted_paths() {
        let update: PreferencesUpdate =
            serde_json::from_str(r#"{"auto_sharing": true, "share_projects": false}"#).unwrap();
        let set = update.to_set();
        assert_eq!(set.get_bool("auto_sharing").unwrap(), true);
        assert_eq!(set.get_bool("share_preferences.share_projects").unwrap(), false);
        assert!(!set.contains_key("share_preferences.share_milestones"));
    }
}
