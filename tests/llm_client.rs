//! Completion client tests against stubbed HTTP endpoints.
//!
//! Uses wiremock to stand in for OpenAI-compatible chat completion APIs:
//! - Request shape and authentication
//! - Response extraction
//! - Error classification for non-success and malformed bodies

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use cardvault::Error;
use cardvault::llm::{CompletionClient, LmStudioClient, OpenAiClient};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

// ============================================================================
// OpenAI
// ============================================================================

#[tokio::test]
async fn test_openai_sends_bearer_and_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "what is a mox?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A zero-cost mana artifact.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(SecretString::from("sk-test".to_string()))
        .with_endpoint(format!("{}/v1", server.uri()));
    let reply = client.complete("be brief", "what is a mox?").await.unwrap();

    assert_eq!(reply, "A zero-cost mana artifact.");
}

#[tokio::test]
async fn test_openai_non_success_is_external_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(SecretString::from("sk-test".to_string()))
        .with_endpoint(format!("{}/v1", server.uri()));
    let err = client.complete("sys", "hi").await.unwrap_err();

    assert!(matches!(err, Error::ExternalService { ref service, .. } if service == "openai"));
    assert!(err.to_string().contains("429"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_openai_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(SecretString::from("sk-test".to_string()))
        .with_endpoint(format!("{}/v1", server.uri()));
    let err = client.complete("sys", "hi").await.unwrap_err();

    assert!(err.to_string().contains("malformed response"));
}

#[tokio::test]
async fn test_openai_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(SecretString::from("sk-test".to_string()))
        .with_endpoint(format!("{}/v1", server.uri()));
    let err = client.complete("sys", "hi").await.unwrap_err();

    assert!(err.to_string().contains("no choices"));
}

// ============================================================================
// LM Studio
// ============================================================================

#[tokio::test]
async fn test_lmstudio_local_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "local-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{ "tool": "search_cards", "arguments": { "name": "Black Lotus" } }"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = LmStudioClient::new().with_endpoint(format!("{}/v1", server.uri()));
    let reply = client.complete("sys", "power nine").await.unwrap();

    assert!(reply.contains("search_cards"));
}

#[tokio::test]
async fn test_lmstudio_availability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let client = LmStudioClient::new().with_endpoint(format!("{}/v1", server.uri()));
    assert!(client.is_available().await);

    let offline = LmStudioClient::new().with_endpoint("http://127.0.0.1:9/v1");
    assert!(!offline.is_available().await);
}
