//! LinkedIn access through the Unipile REST API.
//!
//! Every call is authenticated with `Authorization: Bearer <UNIPILE_API_KEY>`.
//! Without a key every operation fails with "Unipile API not configured".

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::UnipileArgs;
use crate::db::schemas::LinkedInProfile;
use crate::types::{IgniteError, Result};

pub const NOT_CONFIGURED: &str = "Unipile API not configured";

const LINKEDIN_PROFILE_PREFIXES: [&str; 4] = [
    "https://www.linkedin.com/in/",
    "https://linkedin.com/in/",
    "http://www.linkedin.com/in/",
    "http://linkedin.com/in/",
];

/// Result of publishing a post
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublishedPost {
    pub success: bool,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub posted_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UnipileClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl UnipileClient {
    pub fn new(args: &UnipileArgs, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| IgniteError::Config(format!("Failed to create Unipile client: {}", e)))?;

        Ok(Self {
            client,
            base_url: args.unipile_base_url.trim_end_matches('/').to_string(),
            api_key: args.unipile_api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| IgniteError::Upstream(NOT_CONFIGURED.to_string()))?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::AUTHORIZATION, format!("Bearer {}", key)))
    }

    async fn send(&self, builder: RequestBuilder, account_id: Option<&str>) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Unipile request failed with {}: {}", status, truncate(&body, 200));
            return Err(status_error(status.as_u16(), account_id, &body));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    /// Start a LinkedIn account connection for an application user
    pub async fn connect(&self, user_id: &str, credentials: Option<Value>) -> Result<Value> {
        let mut payload = json!({ "provider": "linkedin", "user_id": user_id });
        if let Some(credentials) = credentials {
            payload["credentials"] = credentials;
        }
        let builder = self.request(Method::POST, "/accounts")?.json(&payload);
        let account = self.send(builder, None).await?;
        info!("Unipile account connected for {}", user_id);
        Ok(account)
    }

    pub async fn profile(&self, account_id: &str) -> Result<LinkedInProfile> {
        let builder = self.request(Method::GET, &format!("/accounts/{}/profile", account_id))?;
        let raw = self.send(builder, Some(account_id)).await?;
        Ok(parse_profile(&raw, Utc::now()))
    }

    pub async fn post(&self, account_id: &str, text: &str, media: Option<Value>) -> Result<PublishedPost> {
        let mut payload = json!({ "text": text });
        if let Some(media) = media {
            payload["media"] = media;
        }
        debug!("Publishing {} chars to LinkedIn account {}", text.len(), mask_account_id(account_id));
        let builder = self
            .request(Method::POST, &format!("/accounts/{}/posts", account_id))?
            .json(&payload);
        let result = self.send(builder, Some(account_id)).await?;

        Ok(PublishedPost {
            success: true,
            post_id: result.get("id").and_then(value_to_string),
            post_url: result.get("url").and_then(value_to_string),
            posted_at: Utc::now(),
        })
    }

    pub async fn account_info(&self, account_id: &str) -> Result<Value> {
        let builder = self.request(Method::GET, &format!("/accounts/{}", account_id))?;
        self.send(builder, Some(account_id)).await
    }

    pub async fn disconnect(&self, account_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/accounts/{}", account_id))?;
        self.send(builder, Some(account_id)).await?;
        info!("Unipile account {} disconnected", mask_account_id(account_id));
        Ok(())
    }
}

fn status_error(status: u16, account_id: Option<&str>, body: &str) -> IgniteError {
    let message = match (status, account_id) {
        (401, _) => "Invalid Unipile API key. Please check your API key.".to_string(),
        (403, _) => "LinkedIn account access denied. Please reconnect your account.".to_string(),
        (404, Some(id)) => format!("LinkedIn account {} not found.", mask_account_id(id)),
        (429, _) => "Unipile rate limit exceeded. Please try again later.".to_string(),
        _ => {
            let detail = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| truncate(body, 200));
            format!("Unipile API error {}: {}", status, detail)
        }
    };
    IgniteError::Upstream(message)
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(raw: &Value, key: &str) -> String {
    raw.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn array_field(raw: &Value, key: &str) -> Vec<Value> {
    raw.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
}

/// Structure a raw Unipile profile payload
pub fn parse_profile(raw: &Value, fetched_at: DateTime<Utc>) -> LinkedInProfile {
    let skills = array_field(raw, "skills")
        .iter()
        .filter_map(|skill| match skill {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect();

    LinkedInProfile {
        name: str_field(raw, "name"),
        headline: str_field(raw, "headline"),
        location: str_field(raw, "location"),
        summary: str_field(raw, "summary"),
        experience: array_field(raw, "experience"),
        education: array_field(raw, "education"),
        skills,
        certifications: array_field(raw, "certifications"),
        profile_url: str_field(raw, "profile_url"),
        profile_picture: str_field(raw, "profile_picture"),
        connections_count: raw.get("connections_count").and_then(Value::as_u64).unwrap_or(0),
        fetched_at,
    }
}

pub fn is_valid_linkedin_url(url: &str) -> bool {
    LINKEDIN_PROFILE_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// `***` followed by the last four characters
pub fn mask_account_id(account_id: &str) -> String {
    let chars: Vec<char> = account_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{}", tail)
}
