//! HTTP-level tests for the OpenAI-compatible completion client.

use discourse_digest::ai::{CompletionClient, OpenAiCompatClient};
use discourse_digest::error::Error;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_complete_returns_first_choice_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "  {\"summary\": \"ok\"}  "}}
            ]
        })))
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new(&server.uri(), "test-key", "test-model");
    let text = client
        .complete("system", "user", 0.7, 500)
        .await
        .expect("completion should succeed");
    assert_eq!(text, "{\"summary\": \"ok\"}");
}

#[tokio::test]
async fn test_api_error_maps_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new(&server.uri(), "test-key", "test-model");
    let err = client.complete("system", "user", 0.7, 500).await.unwrap_err();
    assert!(matches!(err, Error::AiUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn test_empty_choices_maps_to_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new(&server.uri(), "test-key", "test-model");
    let err = client.complete("system", "user", 0.7, 500).await.unwrap_err();
    assert!(matches!(err, Error::AiParse(_)), "got {err:?}");
}
