//! Text runtime client against a mocked OpenAI-compatible server.

use llm_bridge::{ask, reply, AskOutcome, BackendConfig, LocalTextModel, ReplyOutcome, REPLY_PARAMS};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> BackendConfig {
    BackendConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "gemma-2-2b".to_string(),
        api_key: None,
        timeout_secs: 5,
    }
}

async fn serve_models(server: &MockServer, ids: &[&str]) {
    let data: Vec<_> = ids.iter().map(|id| json!({"id": id, "object": "model"})).collect();
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": data})))
        .mount(server)
        .await;
}

async fn serve_completion(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "text": text, "finish_reason": "length"}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ask_returns_stripped_response() {
    let server = MockServer::start().await;
    serve_models(&server, &["gemma-2-2b"]).await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({
            "model": "gemma-2-2b",
            "prompt": "Suggest a chord",
            "max_tokens": 150
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": "Suggest a chord  Try Dm7. "}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = ask(config_for(&server), "Suggest a chord").await;
    assert_eq!(
        outcome,
        AskOutcome::Answer {
            response: "Try Dm7.".to_string(),
            model: "gemma-2-2b".to_string(),
            local: true,
        }
    );
}

#[tokio::test]
async fn ask_reports_missing_model_as_load_failure() {
    let server = MockServer::start().await;
    serve_models(&server, &["llama-3"]).await;

    match ask(config_for(&server), "hello").await {
        AskOutcome::Failed { error } => {
            assert!(error.starts_with("Failed to load model: "), "{error}");
            assert!(error.contains("gemma-2-2b"));
        }
        other => panic!("expected load failure, got {other:?}"),
    }
}

#[tokio::test]
async fn ask_wraps_generation_errors_in_response() {
    let server = MockServer::start().await;
    serve_models(&server, &["gemma-2-2b"]).await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
        .mount(&server)
        .await;

    match ask(config_for(&server), "hello").await {
        AskOutcome::Answer { response, local, .. } => {
            assert!(response.starts_with("Error generating response: "), "{response}");
            assert!(response.contains("out of memory"));
            assert!(local);
        }
        other => panic!("expected answer, got {other:?}"),
    }
}

#[tokio::test]
async fn reply_uses_greedy_decoding() {
    let server = MockServer::start().await;
    serve_models(&server, &["gemma-2-2b"]).await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({"max_tokens": 200, "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": "Sure thing."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(
        reply(config_for(&server), "Can you help?").await,
        ReplyOutcome::Reply {
            reply: "Sure thing.".to_string()
        }
    );
}

#[tokio::test]
async fn reply_reports_unreachable_runtime() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    drop(server);

    assert!(matches!(
        reply(config, "hello").await,
        ReplyOutcome::Failed { .. }
    ));
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;
    serve_models(&server, &["gemma-2-2b"]).await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let model = LocalTextModel::load(config_for(&server)).await.unwrap();
    assert!(matches!(
        model.generate("hi", REPLY_PARAMS).await,
        Err(llm_bridge::Error::EmptyCompletion)
    ));
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "gemma-2-2b"}]})))
        .expect(1)
        .mount(&server)
        .await;
    serve_completion(&server, "ok").await;

    let config = BackendConfig {
        api_key: Some("sekrit".to_string()),
        ..config_for(&server)
    };
    let model = LocalTextModel::load(config).await.unwrap();
    assert_eq!(model.model_name(), "gemma-2-2b");
}
