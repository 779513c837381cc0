//! Remote backend against a mock OpenAI-compatible API.

use edgequake_textkit::service::RemoteBackend;
use edgequake_textkit::{GenerationParams, ServiceConfig, ServiceError, TextBackend};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

fn backend_for(server: &ServerGuard) -> RemoteBackend {
    let config = ServiceConfig::builder()
        .local_mode(false)
        .api_base(format!("{}/v1/", server.url()))
        .api_key("sk-test")
        .token_count_timeout_secs(2)
        .generate_timeout_secs(5)
        .build()
        .unwrap();
    RemoteBackend::new(&config).unwrap()
}

// ── Token counting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn count_uses_remote_tokenizer() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/tokenizers/estimate-token-count")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::Json(json!({"text": "hello world"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token_count": 42}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    assert_eq!(backend.count_tokens("hello world").await, 42);
    mock.assert_async().await;
}

#[tokio::test]
async fn count_falls_back_to_estimate_on_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/tokenizers/estimate-token-count")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let backend = backend_for(&server);
    // 16 characters -> 4
    assert_eq!(backend.count_tokens("abcdefghijklmnop").await, 4);
}

#[tokio::test]
async fn count_falls_back_when_field_is_missing() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/tokenizers/estimate-token-count")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"usage": {"tokens": 9}}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    assert_eq!(backend.count_tokens("abcdefgh").await, 2);
}

// ── Generation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_returns_first_choice() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "qwen-long",
            "messages": [{"role": "user", "content": "Summarise this"}],
            "max_tokens": 64
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "A summary."}}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let backend = backend_for(&server);
    let params = GenerationParams {
        max_tokens: 64,
        temperature: 0.2,
    };
    let text = backend.generate("Summarise this", params).await.unwrap();
    assert_eq!(text, "A summary.");
    mock.assert_async().await;
}

#[tokio::test]
async fn generate_passes_upstream_errors_through() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(r#"{"error":"quota exceeded"}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    let err = backend
        .generate("hi", GenerationParams::default())
        .await
        .unwrap_err();
    match err {
        ServiceError::Upstream { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, r#"{"error":"quota exceeded"}"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn generate_without_choices_is_a_call_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    let err = backend
        .generate("hi", GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::RemoteCallFailed(_)), "{err:?}");
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn unreachable_api_is_a_call_failure() {
    let config = ServiceConfig::builder()
        .local_mode(false)
        .api_base("http://127.0.0.1:9")
        .generate_timeout_secs(2)
        .build()
        .unwrap();
    let backend = RemoteBackend::new(&config).unwrap();

    let err = backend
        .generate("hi", GenerationParams::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("API call failed: "), "{err}");
    // Token counting never fails.
    assert_eq!(backend.count_tokens("abcd").await, 1);
}

#[tokio::test]
async fn non_200_success_status_is_passed_through() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(202)
        .with_body("queued")
        .create_async()
        .await;

    let backend = backend_for(&server);
    let err = backend
        .generate("hi", GenerationParams::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 202);
    assert_eq!(err.to_string(), "queued");
}

#[tokio::test]
async fn count_treats_non_200_as_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/tokenizers/estimate-token-count")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token_count": 99}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    assert_eq!(backend.count_tokens("abcdefgh").await, 2);
}
