//! GET/PUT /api/profile

use bson::{doc, Document};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::UserDoc;
use crate::db::Store;
use crate::routes::{
    error_json, error_response, method_not_allowed, ok_json, parse_json_body, require_store,
    AuthUser, BoxBody,
};
use crate::server::AppState;
use crate::types::Result;

/// Profile fields a user may change; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub career_goal: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_username: Option<String>,
    pub skills: Option<Vec<String>>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
}

impl ProfileUpdate {
    fn to_set(&self) -> Document {
        let mut set = Document::new();
        let text_fields = [
            ("name", &self.name),
            ("career_goal", &self.career_goal),
            ("linkedin_url", &self.linkedin_url),
            ("github_username", &self.github_username),
            ("headline", &self.headline),
            ("summary", &self.summary),
            ("location", &self.location),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value {
                set.insert(field, value.trim());
            }
        }
        if let Some(skills) = &self.skills {
            let skills: Vec<&str> = skills
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            set.insert("skills", skills);
        }
        set
    }
}

pub async fn handle_profile_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: AuthUser,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let response = match method {
        Method::GET => get_profile(state, user).await,
        Method::PUT => update_profile(req, state, user).await,
        _ => method_not_allowed(),
    };
    Some(response)
}

async fn load_user(store: &Store, user_id: &str) -> Result<Option<UserDoc>> {
    store.users.find_one(doc! { "user_id": user_id }).await
}

async fn get_profile(state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let store = crate::try_response!(require_store(&state));
    match crate::try_service!(load_user(store, &user.user_id).await) {
        Some(doc) => ok_json(&doc.profile()),
        None => error_json(StatusCode::NOT_FOUND, "User not found", Some("USER_NOT_FOUND")),
    }
}

async fn update_profile(req: Request<Incoming>, state: Arc<AppState>, user: AuthUser) -> Response<BoxBody> {
    let update: ProfileUpdate = crate::try_service!(parse_json_body(req).await);
    let store = crate::try_response!(require_store(&state));

    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return error_json(StatusCode::BAD_REQUEST, "Name cannot be empty", Some("BAD_REQUEST"));
    }

    let set = update.to_set();
    if !set.is_empty() {
        if let Err(e) = store
            .users
            .update_one(doc! { "user_id": &user.user_id }, doc! { "$set": set })
            .await
        {
            return error_response(e);
        }
        let cleared = state.profiles.invalidate(&user.user_id).await;
        info!("Profile updated for {} ({} cache entries cleared)", user.user_id, cleared);
    }

    match crate::try_service!(load_user(store, &user.user_id).await) {
        Some(doc) => ok_json(&doc.profile()),
        None => error_json(StatusCode::NOT_FOUND, "User not found", Some("USER_NOT_FOUND")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sets_only_present_fields() {
        let update: ProfileUpdate = serde_json::from_str(
            r#"{"career_goal": " Data Engineer ", "skills": ["SQL", " ", "Python "]}"#,
        )
        .unwrap();
        let set = update.to_set();
        assert_eq!(set.get_str("career_goal").unwrap(), "Data Engineer");
        assert_eq!(set.get_array("skills").unwrap().len(), 2);
        assert!(!set.contains_key("headline"));
    }

    #[test]
    fn test_empty_update_is_a_no_op() {
        assert!(ProfileUpdate::default().to_set().is_empty());
    }
}
