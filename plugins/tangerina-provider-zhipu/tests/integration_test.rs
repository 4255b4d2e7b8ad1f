use tangerina_core::error::FallbackError;
use tangerina_core::fallback::request_turn;
use tangerina_core::types::{ConversationMessage, TerminationReason};
use tangerina_provider_zhipu::ZhipuProvider;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_msg(text: &str) -> ConversationMessage {
    ConversationMessage::User(text.to_string())
}

fn glm_body(content: serde_json::Value, finish_reason: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "glm-test",
        "model": "glm-4-plus",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": finish_reason
        }]
    })
}

#[tokio::test]
async fn test_text_response_sends_sampling_params() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer zhipu-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "glm-4-plus",
            "temperature": 0.7,
            "top_p": 0.9,
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(glm_body("Oi!".into(), "stop")))
        .mount(&server)
        .await;

    let provider = ZhipuProvider::new("zhipu-key", None, Some(&server.uri()));
    let turn = request_turn(&provider, &[user_msg("Oi")], 1000, &[]).await.unwrap();
    assert_eq!(turn.text_content.as_deref(), Some("Oi!"));
    assert_eq!(turn.termination, TerminationReason::Stop);
}

#[tokio::test]
async fn test_falls_back_across_glm_models() {
    let server = MockServer::start().await;

    for model in ["glm-4-plus", "glm-4-flash"] {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({ "model": model })))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "glm-3-turbo" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(glm_body("turbo".into(), "length")))
        .mount(&server)
        .await;

    let provider = ZhipuProvider::new("zhipu-key", None, Some(&server.uri()));
    let turn = request_turn(&provider, &[user_msg("Oi")], 1000, &[]).await.unwrap();
    assert_eq!(turn.text_content.as_deref(), Some("turbo"));
    assert_eq!(turn.termination, TerminationReason::Length);
}

#[tokio::test]
async fn test_all_models_failing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .expect(4)
        .mount(&server)
        .await;

    let provider = ZhipuProvider::new("zhipu-key", None, Some(&server.uri()));
    let err = request_turn(&provider, &[user_msg("Oi")], 1000, &[])
        .await
        .unwrap_err();
    match err {
        FallbackError::AllCandidatesFailed { attempts, .. } => {
            assert_eq!(attempts.len(), 4);
            assert!(attempts[0].starts_with("glm-4-plus: "));
            assert!(attempts[3].starts_with("glm-4: "));
        }
        other => panic!("unexpected error: {other}"),
    }
}
