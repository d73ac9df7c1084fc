//! Cache key construction
//!
//! Keys look like `pbsc:{prefix}:{identifier}`; when request parameters are
//! part of the lookup, the first 8 hex digits of the md5 of their JSON form are
//! appended: `pbsc:{prefix}:{identifier}:{hash}`.

use serde_json::Value;

/// Namespace shared by every key this application writes
pub const KEY_NAMESPACE: &str = "pbsc";

/// Kind of cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePrefix {
    ProfileSummary,
    ProfileContext,
    Perplexity,
    Groq,
    LinkedIn,
    Session,
    Conversation,
    Roadmap,
    LearningPlan,
}

impl CachePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileSummary => "profile_summary",
            Self::ProfileContext => "profile_context",
            Self::Perplexity => "perplexity",
            Self::Groq => "groq",
            Self::LinkedIn => "linkedin",
            Self::Session => "session",
            Self::Conversation => "conversation",
            Self::Roadmap => "roadmap",
            Self::LearningPlan => "learning_plan",
        }
    }
}

/// Build a cache key, optionally qualified by a hash of the parameters
pub fn cache_key(prefix: CachePrefix, identifier: &str, params: Option<&Value>) -> String {
    match params {
        Some(params) => format!(
            "{}:{}:{}:{}",
            KEY_NAMESPACE,
            prefix.as_str(),
            identifier,
            params_hash(params)
        ),
        None => format!("{}:{}:{}", KEY_NAMESPACE, prefix.as_str(), identifier),
    }
}

/// First 8 hex digits of md5 over the JSON form of the parameters.
///
/// `serde_json::Map` keeps keys sorted, so equal parameter sets hash equally
/// regardless of insertion order.
pub fn params_hash(params: &Value) -> String {
    let digest = format!("{:x}", md5::compute(params.to_string()));
    digest[..8].to_string()
}

/// Full md5 hex digest, used to key API responses by their prompt
pub fn content_hash(content: &str) -> String {
    format!("{:x}", md5::compute(content))
}

/// Glob patterns covering every cached entry for one user
pub fn user_patterns(user_id: &str) -> Vec<String> {
    vec![
        format!("{}:profile_*:{}", KEY_NAMESPACE, user_id),
        format!("{}:profile_*:{}:*", KEY_NAMESPACE, user_id),
        format!("{}:session:{}", KEY_NAMESPACE, user_id),
        format!("{}:conversation:{}:*", KEY_NAMESPACE, user_id),
        format!("{}:roadmap:{}", KEY_NAMESPACE, user_id),
        format!("{}:learning_plan:{}:*", KEY_NAMESPACE, user_id),
    ]
}

/// Glob patterns covering cached AI provider responses
pub fn api_patterns() -> Vec<String> {
    vec![
        format!("{}:{}:*", KEY_NAMESPACE, CachePrefix::Perplexity.as_str()),
        format!("{}:{}:*", KEY_NAMESPACE, CachePrefix::Groq.as_str()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_key() {
        assert_eq!(cache_key(CachePrefix::Roadmap, "u1", None), "pbsc:roadmap:u1");
        assert_eq!(
            cache_key(CachePrefix::ProfileSummary, "u1", None),
            "pbsc:profile_summary:u1"
        );
    }

    #[test]
    fn test_key_with_params_is_order_independent() {
        let a = cache_key(CachePrefix::LearningPlan, "u1", Some(&json!({"phase": 1, "level": "x"})));
        let b = cache_key(CachePrefix::LearningPlan, "u1", Some(&json!({"level": "x", "phase": 1})));
        assert_eq!(a, b);
        assert!(a.starts_with("pbsc:learning_plan:u1:"));
        assert_eq!(a.rsplit(':').next().unwrap().len(), 8);

        let c = cache_key(CachePrefix::LearningPlan, "u1", Some(&json!({"phase": 2, "level": "x"})));
        assert_ne!(a, c);
    }

    #[test]
    fn test_user_patterns_cover_profile_and_plans() {
        let patterns = user_patterns("u9");
        assert!(patterns.contains(&"pbsc:profile_*:u9".to_string()));
        assert!(patterns.contains(&"pbsc:learning_plan:u9:*".to_string()));
        assert_eq!(patterns.len(), 6);
    }
}
