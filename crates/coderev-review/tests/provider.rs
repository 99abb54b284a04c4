use std::time::Duration;

use coderev_core::{ApiKey, CoderevError, InputMode, LlmConfig, UploadedItem};
use coderev_review::llm::{LlmClient, NO_CONTENT_FALLBACK};
use coderev_review::{ReviewSession, RunOutcome};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> Value {
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

fn session_for(server: &MockServer) -> ReviewSession<LlmClient> {
    let config = LlmConfig {
        base_url: Some(server.uri()),
        ..LlmConfig::default()
    };
    let client = LlmClient::new(&config).expect("client");
    ReviewSession::new(client, "security")
}

#[tokio::test]
async fn sends_focus_and_file_blocks_in_upload_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("1. [High] ...")))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("sk-test"));
    session.add_items(vec![
        UploadedItem::new("a.py", "x=1"),
        UploadedItem::new("b.py", ""),
    ]);

    let outcome = session.run_review().await;
    let RunOutcome::Completed(record) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(record.result, "1. [High] ...");
    assert_eq!(record.summary, "2 files, 0 manual chars");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().expect("json body");

    assert_eq!(body["model"], "gpt-4o-mini");
    let temperature = body["temperature"].as_f64().unwrap();
    assert!((temperature - 0.2).abs() < 1e-6);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");

    let user = messages[1]["content"].as_str().unwrap();
    let focus = user.find("Review focus: security").unwrap();
    let a = user.find("// File: a.py\nx=1").unwrap();
    let b = user.find("// File: b.py\n// (empty file)").unwrap();
    assert!(focus < a && a < b);
}

#[tokio::test]
async fn provider_error_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_api_key"))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("sk-bad"));
    session.set_input_mode(InputMode::Manual);
    session.set_manual_text("print('hi')");

    let outcome = session.run_review().await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));

    let state = session.snapshot();
    let error = state.last_error().expect("error recorded");
    assert!(error.contains("401"), "{error}");
    assert!(error.contains("invalid_api_key"), "{error}");
    assert!(state.current_output().is_none());
    assert!(state.history().is_empty());
    assert!(!state.is_loading());
}

#[tokio::test]
async fn blank_credential_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("   "));
    session.add_items(vec![UploadedItem::new("a.py", "x=1")]);

    assert!(matches!(session.run_review().await, RunOutcome::Failed(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_input_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("sk-test"));

    assert!(matches!(session.run_review().await, RunOutcome::Failed(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn second_run_while_pending_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("slow review"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("sk-test"));
    session.set_input_mode(InputMode::Manual);
    session.set_manual_text("fn main() {}");

    let (first, second) = tokio::join!(session.run_review(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.snapshot().is_loading());
        session.run_review().await
    });

    assert!(matches!(first, RunOutcome::Completed(_)));
    assert_eq!(second, RunOutcome::Busy);
    let state = session.snapshot();
    assert_eq!(state.history().len(), 1);
    assert!(!state.is_loading());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_content_uses_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("sk-test"));
    session.set_input_mode(InputMode::Manual);
    session.set_manual_text("x = 1");

    let RunOutcome::Completed(record) = session.run_review().await else {
        panic!("fallback content is not an error");
    };
    assert_eq!(record.result, NO_CONTENT_FALLBACK);
    assert_eq!(session.snapshot().current_output(), Some(NO_CONTENT_FALLBACK));
}

#[tokio::test]
async fn history_is_most_recent_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("review")))
        .expect(2)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.set_credential(ApiKey::new("sk-test"));
    session.set_input_mode(InputMode::Manual);
    session.set_manual_text("a");
    let RunOutcome::Completed(first) = session.run_review().await else {
        panic!("first run failed");
    };
    session.set_manual_text("bb");
    let RunOutcome::Completed(second) = session.run_review().await else {
        panic!("second run failed");
    };

    let state = session.snapshot();
    let ids: Vec<_> = state.history().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(second.summary, "0 files, 2 manual chars");
    assert_ne!(first.digest, second.digest);
}

#[tokio::test]
async fn unreachable_provider_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = LlmConfig {
        base_url: Some(format!("http://{addr}")),
        ..LlmConfig::default()
    };
    let session = ReviewSession::new(LlmClient::new(&config).unwrap(), "bugs");
    session.set_credential(ApiKey::new("sk-test"));
    session.set_input_mode(InputMode::Manual);
    session.set_manual_text("x = 1");

    let RunOutcome::Failed(failure) = session.run_review().await else {
        panic!("expected a network failure");
    };
    assert!(matches!(failure.error(), CoderevError::Network(_)));
    assert!(failure.to_string().starts_with("network error"), "{failure}");
}

#[tokio::test]
async fn configured_timeout_fails_slow_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = LlmConfig {
        base_url: Some(server.uri()),
        timeout_secs: Some(1),
        ..LlmConfig::default()
    };
    let session = ReviewSession::new(LlmClient::new(&config).unwrap(), "bugs");
    session.set_credential(ApiKey::new("sk-test"));
    session.set_input_mode(InputMode::Manual);
    session.set_manual_text("x = 1");

    let RunOutcome::Failed(failure) = session.run_review().await else {
        panic!("expected a timeout");
    };
    assert!(matches!(failure.error(), CoderevError::Network(_)));
    assert!(failure.to_string().starts_with("network error"), "{failure}");
}
