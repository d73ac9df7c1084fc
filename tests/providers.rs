//! Outbound API clients against mock servers

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ignite::config::UnipileArgs;
use ignite::llm::{CompletionRequest, LlmBackend, LlmError, OpenAiBackend, PerplexityBackend};
use ignite::services::UnipileClient;

const TIMEOUT: Duration = Duration::from_secs(5);

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "content": content }, "finish_reason": "stop" }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5 }
    })
}

#[tokio::test]
async fn groq_completion_sends_model_and_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer groq-key"))
        .and(body_partial_json(json!({ "model": "llama-test", "max_tokens": 400 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("  Keep going!  ")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::groq(&server.uri(), "llama-test", "groq-key", TIMEOUT).unwrap();
    let reply = backend
        .complete(CompletionRequest::user("Write a post").with_max_tokens(400))
        .await
        .unwrap();

    assert_eq!(reply.content, "Keep going!");
    assert_eq!(reply.usage.prompt_tokens, 12);
    assert!(reply.citations.is_empty());
}

#[tokio::test]
async fn groq_rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::groq(&server.uri(), "llama-test", "groq-key", TIMEOUT).unwrap();
    let err = backend.complete(CompletionRequest::user("hi")).await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { retry_after_ms: Some(3000) }));
}

#[tokio::test]
async fn groq_rejected_key_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::groq(&server.uri(), "llama-test", "bad", TIMEOUT).unwrap();
    let err = backend.complete(CompletionRequest::user("hi")).await.unwrap_err();
    assert!(matches!(err, LlmError::Unauthorized));
}

#[tokio::test]
async fn perplexity_sends_search_options_and_returns_citations() {
    let server = MockServer::start().await;
    let mut reply = chat_reply("Rust demand is growing.");
    reply["citations"] = json!(["https://example.com/report", "https://rust-lang.org"]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer pplx-key"))
        .and(body_partial_json(json!({
            "model": "sonar-pro",
            "return_images": false,
            "return_related_questions": false,
            "top_k": 0,
            "web_search_options": { "search_context_size": "medium", "focus": "educational" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply))
        .expect(1)
        .mount(&server)
        .await;

    let backend = PerplexityBackend::new(server.uri(), "sonar-pro", "pplx-key", TIMEOUT).unwrap();
    let response = backend
        .complete(CompletionRequest::user("trends").with_search_focus("educational"))
        .await
        .unwrap();

    assert_eq!(response.content, "Rust demand is growing.");
    assert_eq!(response.citations.len(), 2);
}

#[tokio::test]
async fn perplexity_requires_a_key() {
    let result = PerplexityBackend::new("https://api.perplexity.ai", "sonar-pro", " ", TIMEOUT);
    assert!(matches!(result, Err(LlmError::NotConfigured(_))));
}

fn unipile(server: &MockServer) -> UnipileClient {
    let args = UnipileArgs {
        unipile_api_key: Some("uni-key".to_string()),
        unipile_base_url: format!("{}/", server.uri()),
    };
    UnipileClient::new(&args, TIMEOUT).unwrap()
}

#[tokio::test]
async fn unipile_post_returns_id_and_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/acct-1234/posts"))
        .and(header("authorization", "Bearer uni-key"))
        .and(body_partial_json(json!({ "text": "Day 3 done!" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "urn:li:share:42",
            "url": "https://www.linkedin.com/feed/update/urn:li:share:42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let published = unipile(&server).post("acct-1234", "Day 3 done!", None).await.unwrap();
    assert!(published.success);
    assert_eq!(published.post_id.as_deref(), Some("urn:li:share:42"));
    assert!(published.post_url.unwrap().contains("linkedin.com"));
}

#[tokio::test]
async fn unipile_profile_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct-1234/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Ada Lovelace",
            "headline": "Aspiring Data Engineer",
            "skills": [{ "name": "SQL" }, "Python"],
            "connections_count": 120
        })))
        .mount(&server)
        .await;

    let profile = unipile(&server).profile("acct-1234").await.unwrap();
    assert_eq!(profile.name, "Ada Lovelace");
    assert_eq!(profile.skills, vec!["SQL", "Python"]);
    assert_eq!(profile.connections_count, 120);
}

#[tokio::test]
async fn unipile_missing_account_masks_the_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/account-9876/profile"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = unipile(&server).profile("account-9876").await.unwrap_err();
    assert_eq!(err.public_message(), "LinkedIn account ***9876 not found.");
}

#[tokio::test]
async fn unipile_connect_and_disconnect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .and(body_partial_json(json!({ "provider": "linkedin", "user_id": "u-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "acct-new" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/accounts/acct-new"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = unipile(&server);
    let account = client.connect("u-1", None).await.unwrap();
    assert_eq!(account["id"], "acct-new");
    client.disconnect("acct-new").await.unwrap();
}

#[tokio::test]
async fn unipile_account_info_is_returned_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct-1234"))
        .and(header("authorization", "Bearer uni-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acct-1234",
            "type": "LINKEDIN",
            "status": "OK"
        })))
        .mount(&server)
        .await;

    let info = unipile(&server).account_info("acct-1234").await.unwrap();
    assert_eq!(info["type"], "LINKEDIN");
}
