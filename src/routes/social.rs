//! Social sharing routes
//!
//! Posts are generated as drafts, previewed without storage, and published
//! to the user's connected LinkedIn account through Unipile.

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{AchievementDoc, PostStatus, SocialPostDoc, UserDoc};
use crate::db::Store;
use crate::routes::linkedin::require_connection;
use crate::routes::{
    error_json, error_response, json_response, method_not_allowed, ok_json, parse_json_body,
    require_store, AuthUser, BoxBody,
};
use crate::server::AppState;
use crate::services::posts::{self, PostRequest};
use crate::types::{IgniteError, Result};

const ACHIEVEMENTS_LIMIT: i64 = 20;

/// Name used in posts when the profile has none
const DEFAULT_USER_NAME: &str = "A learner";

/// API view of a stored post
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: Option<String>,
    pub post_content: String,
    pub post_type: String,
    pub status: PostStatus,
    pub details: Value,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub posted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&SocialPostDoc> for PostView {
    fn from(doc: &SocialPostDoc) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()),
            post_content: doc.post_content.clone(),
            post_type: doc.post_type.clone(),
            status: doc.status,
            details: doc.details.clone(),
            post_id: doc.post_id.clone(),
            post_url: doc.post_url.clone(),
            posted_at: doc.posted_at.map(|d| d.to_chrono()),
            created_at: doc.created_at.map(|d| d.to_chrono()),
        }
    }
}

#[derive(Debug, Serialize)]
struct AchievementView {
    id: Option<String>,
    achievement_type: String,
    title: String,
    description: String,
    data: Value,
    earned_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&AchievementDoc> for AchievementView {
    fn from(doc: &AchievementDoc) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()),
            achievement_type: doc.achievement_type.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            data: doc.data.clone(),
            earned_at: doc.earned_at.map(|d| d.to_chrono()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default, alias = "content")]
    pub post_content: String,
    #[serde(default)]
    pub draft_id: Option<String>,
    #[serde(default)]
    pub post_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectAccountRequest {
    #[serde(default)]
    pub credentials: Option<Value>,
}

pub async fn handle_social_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    rest: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();

    if let Some(id) = rest.strip_prefix("delete_post/") {
        return Some(match method {
            Method::DELETE => delete_post(state, user, id).await,
            _ => method_not_allowed(),
        });
    }

    let response = match (method, rest) {
        (Method::POST, "generate_post") => generate_post(req, state, user, true).await,
        (Method::POST, "preview_post") => generate_post(req, state, user, false).await,
        (Method::POST, "post_to_linkedin") => post_to_linkedin(req, state, user).await,
        (Method::POST, "connect_linkedin") => connect_linkedin(req, state, user).await,
        (Method::GET, "achievements") => achievements(state, user).await,
        (
            _,
            "generate_post" | "preview_post" | "post_to_linkedin" | "connect_linkedin"
            | "achievements",
        ) => method_not_allowed(),
        _ => return None,
    };
    Some(response)
}

async fn account(store: &Store, user_id: &str) -> Result<Option<UserDoc>> {
    store.users.find_one(doc! { "user_id": user_id }).await
}

/// Display name for posts
pub(crate) async fn user_name(store: &Store, user_id: &str) -> Result<String> {
    Ok(account(store, user_id)
        .await?
        .map(|u| u.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()))
}

/// POST /social/generate_post (stores a draft) and /social/preview_post
async fn generate_post(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
    store_draft: bool,
) -> Response<BoxBody> {
    let raw: Value = crate::try_service!(parse_json_body(req).await);
    let request: PostRequest = match serde_json::from_value(raw.clone()) {
        Ok(request) => request,
        Err(e) => {
            return error_json(
                StatusCode::BAD_REQUEST,
                format!("Invalid post request: {}", e),
                Some("INVALID_POST_TYPE"),
            )
        }
    };
    let store = crate::try_response!(require_store(&state));

    let user_doc = crate::try_service!(account(store, &user.user_id).await);
    let name = user_doc
        .as_ref()
        .map(|u| u.name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());
    let goal = user_doc.as_ref().and_then(|u| u.career_goal.clone());

    let content = posts::generate(&state.providers, &name, goal.as_deref(), &request).await;

    if !store_draft {
        return ok_json(&json!({
            "success": true,
            "post_content": content,
            "post_type": request.kind(),
        }));
    }

    let draft_id = crate::try_service!(
        store
            .social_posts
            .insert_one(SocialPostDoc {
                user_id: user.user_id.clone(),
                post_content: content.clone(),
                post_type: request.kind().to_string(),
                status: PostStatus::Draft,
                details: raw,
                created_at: Some(bson::DateTime::now()),
                ..Default::default()
            })
            .await
    );
    info!("Stored {} post draft for {}", request.kind(), user.user_id);

    json_response(
        StatusCode::CREATED,
        &json!({
            "success": true,
            "post_content": content,
            "post_type": request.kind(),
            "draft_id": draft_id.to_hex(),
        }),
    )
}

/// POST /social/post_to_linkedin
async fn post_to_linkedin(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: PublishRequest = crate::try_service!(parse_json_body(req).await);
    let content = body.post_content.trim();
    if content.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "Post content is required", Some("BAD_REQUEST"));
    }
    let store = crate::try_response!(require_store(&state));
    let (_, account_id) = crate::try_service!(require_connection(store, &user.user_id).await);

    let published = crate::try_service!(state.unipile.post(&account_id, content, None).await);
    let posted_at = bson::DateTime::from_chrono(published.posted_at);

    let draft = body
        .draft_id
        .as_deref()
        .and_then(|id| ObjectId::parse_str(id).ok());
    let marked = match draft {
        Some(id) => {
            let result = crate::try_service!(
                store
                    .social_posts
                    .update_one(
                        doc! { "_id": id, "user_id": &user.user_id },
                        doc! { "$set": {
                            "post_content": content,
                            "status": "published",
                            "post_id": published.post_id.clone(),
                            "post_url": published.post_url.clone(),
                            "posted_at": posted_at,
                        } },
                    )
                    .await
            );
            result.matched_count > 0
        }
        None => false,
    };
    if !marked {
        crate::try_service!(
            store
                .social_posts
                .insert_one(SocialPostDoc {
                    user_id: user.user_id.clone(),
                    post_content: content.to_string(),
                    post_type: body.post_type.clone().unwrap_or_else(|| "custom".to_string()),
                    status: PostStatus::Published,
                    details: Value::Null,
                    post_id: published.post_id.clone(),
                    post_url: published.post_url.clone(),
                    posted_at: Some(posted_at),
                    created_at: Some(posted_at),
                    ..Default::default()
                })
                .await
        );
    }

    crate::try_service!(
        store
            .achievements
            .insert_one(AchievementDoc::new(
                &user.user_id,
                "linkedin_post",
                "Shared on LinkedIn",
                "Published a post about your learning journey",
                json!({ "post_id": &published.post_id, "post_url": &published.post_url }),
            ))
            .await
    );

    info!("Published LinkedIn post for {}", user.user_id);
    ok_json(&published)
}

/// POST /social/connect_linkedin
async fn connect_linkedin(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let body: ConnectAccountRequest = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    let account = crate::try_service!(state.unipile.connect(&user.user_id, body.credentials).await);
    let account_id = match account
        .get("id")
        .or_else(|| account.get("account_id"))
        .and_then(Value::as_str)
    {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return error_response(IgniteError::Upstream(
                "Unipile did not return an account id".into(),
            ))
        }
    };

    crate::try_service!(
        store
            .linkedin_profiles
            .upsert_one(
                doc! { "user_id": &user.user_id },
                doc! {
                    "user_id": &user.user_id,
                    "account_id": &account_id,
                    "status": "connected",
                    "connected_at": bson::DateTime::now(),
                },
            )
            .await
    );

    ok_json(&json!({
        "success": true,
        "message": "LinkedIn account connected",
        "account_id": crate::services::unipile::mask_account_id(&account_id),
    }))
}

/// GET /social/achievements
async fn achievements(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    let docs = crate::try_service!(
        store
            .achievements
            .find_sorted(
                doc! { "user_id": &user.user_id },
                doc! { "earned_at": -1 },
                Some(ACHIEVEMENTS_LIMIT),
            )
            .await
    );
    let achievements: Vec<AchievementView> = docs.iter().map(AchievementView::from).collect();
    ok_json(&json!({ "achievements": achievements }))
}

/// DELETE /social/delete_post/{id}
async fn delete_post(state: Arc<AppState>, user: AuthUser, id: &str) -> Response<BoxBody> {
    let not_found = || error_json(StatusCode::NOT_FOUND, "Draft not found", Some("NOT_FOUND"));
    let Ok(id) = ObjectId::parse_str(id) else {
        return not_found();
    };
    let store = crate::try_response!(require_store(&state));

    let result = crate::try_service!(
        store
            .social_posts
            .inner()
            .delete_one(doc! { "_id": id, "user_id": &user.user_id, "status": "draft" })
            .await
            .map_err(IgniteError::from)
    );
    if result.deleted_count == 0 {
        return not_found();
    }
    ok_json(&json!({ "success": true, "message": "Draft deleted" }))
}
