//! Sessions wired to the real OpenAI and SerpAPI clients, served by mock
//! HTTP servers.

use std::sync::Arc;
use std::time::Duration;

use parley_config::ToolKind;
use parley_conversation::{Route, SessionConfig, SessionManager, TurnRole};
use parley_core::ErrorKind;
use parley_providers::{OpenAiProvider, RetryPolicy};
use parley_tools::{WEB_SEARCH, WebSearchConfig, registry_for};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer, timeout: Duration) -> Arc<OpenAiProvider> {
    let provider = OpenAiProvider::new("test_api_key".to_string(), timeout)
        .unwrap_or_else(|e| panic!("provider: {e}"))
        .with_base_url(server.uri())
        .with_retry_policy(RetryPolicy::none());
    Arc::new(provider)
}

fn answer(text: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    })
}

#[tokio::test]
async fn test_plain_session_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer("Hi there")))
        .mount(&server)
        .await;

    let mut session = SessionManager::new(
        provider(&server, Duration::from_secs(5)),
        SessionConfig::default(),
        None,
    )
    .unwrap_or_else(|e| panic!("session: {e}"));

    let reply = session
        .submit("Hello")
        .await
        .unwrap_or_else(|e| panic!("submit: {e}"));
    assert_eq!(reply.text, "Hi there");
    assert_eq!(reply.usage.map(|u| u.total_tokens), Some(15));
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_web_search_session_over_http() {
    let llm = MockServer::start().await;
    // Second round-trip: the tool result is in the context.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""role":"tool""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer("It is sunny")))
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "web_search",
                            "arguments": "{\"query\":\"weather today\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&llm)
        .await;

    let serp = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", "weather today"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer_box": {"snippet": "Sunny, 24°C"},
            "organic_results": []
        })))
        .expect(1)
        .mount(&serp)
        .await;

    let registry = registry_for(
        [WEB_SEARCH],
        Some(WebSearchConfig::new("serp_key").with_base_url(serp.uri())),
    )
    .unwrap_or_else(|e| panic!("registry: {e}"));
    let mut session = SessionManager::new(
        provider(&llm, Duration::from_secs(5)),
        SessionConfig::default().with_tool(ToolKind::WebSearch),
        Some(registry),
    )
    .unwrap_or_else(|e| panic!("session: {e}"));
    assert_eq!(session.route(), Route::ToolAugmented);

    let reply = session
        .submit("What's the weather today?")
        .await
        .unwrap_or_else(|e| panic!("submit: {e}"));
    assert_eq!(reply.text, "It is sunny");

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role(), TurnRole::User);
    assert_eq!(history[1].content(), "It is sunny");
}

#[tokio::test]
async fn test_timeout_keeps_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(answer("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut session = SessionManager::new(
        provider(&server, Duration::from_millis(50)),
        SessionConfig::default(),
        None,
    )
    .unwrap_or_else(|e| panic!("session: {e}"));

    let err = session.submit("Hello").await;
    assert!(matches!(
        err.map_err(|e| e.kind()),
        Err(ErrorKind::UpstreamTransient)
    ));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_bad_credentials_surface_as_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let mut session = SessionManager::new(
        provider(&server, Duration::from_secs(5)),
        SessionConfig::default(),
        None,
    )
    .unwrap_or_else(|e| panic!("session: {e}"));

    let err = session.submit("Hello").await;
    let Err(err) = err else {
        panic!("expected an error");
    };
    assert_eq!(err.kind(), ErrorKind::UpstreamAuth);
    assert!(err.to_string().contains("Incorrect API key"));
    assert_eq!(session.history().len(), 1);
}
