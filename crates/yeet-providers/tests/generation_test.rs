//! End-to-end generation tests against mocked provider endpoints.

use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yeet_core::{
    CommitContext, Config, CredentialResolver, MemoryStore, Protocol, ProviderConfig,
    ProviderError,
};
use yeet_providers::http::{self, Deadline};
use yeet_providers::{fetch_models, Engine, Provider};

const SYSTEM_PROMPT: &str = "You write commit messages.";

fn context() -> CommitContext {
    CommitContext::new("+hello").with_system_prompt(SYSTEM_PROMPT)
}

/// Credentials from an in-memory keyring plus a fixed environment.
fn credentials(
    store: MemoryStore,
    env: &'static [(&'static str, &'static str)],
) -> CredentialResolver {
    CredentialResolver::new(Box::new(store))
        .with_env_lookup(move |name: &str| {
            env.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        })
        .with_imported_path(None)
}

fn slot(url: String) -> ProviderConfig {
    ProviderConfig {
        url: Some(url),
        ..ProviderConfig::default()
    }
}

fn sse_body(events: &[(&str, serde_json::Value)]) -> String {
    events
        .iter()
        .map(|(name, data)| format!("event: {}\ndata: {}\n\n", name, data))
        .collect()
}

/// Direct openai call returns the text, token counts and a known cost.
#[tokio::test]
async fn test_direct_openai_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": "Diff:\n+hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "feat: add greeting"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        provider: "openai".to_string(),
        openai: ProviderConfig {
            model: Some("gpt-4o-mini".to_string()),
            ..slot(format!("{}/v1", server.uri()))
        },
        ..Config::default()
    };
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new(), &[("OPENAI_API_KEY", "sk-test")]),
    );

    let generation = engine.generate(&context(), None).await.unwrap();
    assert_eq!(generation.text, "feat: add greeting");
    assert_eq!(generation.usage.model, "gpt-4o-mini");
    assert_eq!(generation.usage.input_tokens, 120);
    assert_eq!(generation.usage.output_tokens, 8);

    let cost = engine.cost(&generation.usage).unwrap();
    assert!(cost.starts_with('$'));
}

/// A missing credential fails before anything is sent.
#[tokio::test]
async fn test_missing_credential_sends_nothing() {
    let server = MockServer::start().await;
    let config = Config {
        provider: "anthropic".to_string(),
        anthropic: slot(format!("{}/v1", server.uri())),
        ..Config::default()
    };
    let engine = Engine::new(config, credentials(MemoryStore::new(), &[]));

    let err = engine.generate(&context(), None).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::MissingCredential { ref provider, .. } if provider == "anthropic"
    ));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

/// A purely custom provider speaks the OpenAI protocol with bearer auth.
#[tokio::test]
async fn test_custom_provider_is_openai_compatible() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer tok-together"))
        .and(body_partial_json(json!({"model": "llama-70b"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "refactor: split parser"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config {
        provider: "together".to_string(),
        ..Config::default()
    };
    config.custom.insert(
        "together".to_string(),
        ProviderConfig {
            model: Some("llama-70b".to_string()),
            url: Some(format!("{}/v1", server.uri())),
            env_var: Some("TOGETHER_API_KEY".to_string()),
        },
    );
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new(), &[("TOGETHER_API_KEY", "tok-together")]),
    );

    let selection = engine.select().unwrap();
    assert_eq!(selection.provider.protocol, Protocol::OpenAi);

    let generation = selection.generate(&context(), None).await.unwrap();
    assert_eq!(generation.text, "refactor: split parser");
    assert!(!generation.usage.is_reported());
    assert_eq!(engine.cost(&generation.usage), None);
}

/// Anthropic streaming delivers fragments in order and collects usage.
#[tokio::test]
async fn test_anthropic_streaming_tokens_in_order() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        (
            "message_start",
            json!({"type": "message_start", "message": {"usage": {"input_tokens": 40, "output_tokens": 1}}}),
        ),
        ("ping", json!({"type": "ping"})),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "fix"}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": ": typo"}}),
        ),
        (
            "message_delta",
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 3}}),
        ),
        ("message_stop", json!({"type": "message_stop"})),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-haiku-4-5-20251001",
            "max_tokens": 256,
            "system": SYSTEM_PROMPT,
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        provider: "anthropic".to_string(),
        anthropic: slot(format!("{}/v1", server.uri())),
        ..Config::default()
    };
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new().with("anthropic", "sk-ant"), &[]),
    );

    let mut seen = Vec::new();
    let mut on_token = |t: &str| seen.push(t.to_string());
    let generation = engine
        .generate(&context(), Some(&mut on_token))
        .await
        .unwrap();

    assert_eq!(seen, vec!["fix", ": typo"]);
    assert_eq!(generation.text, "fix: typo");
    assert_eq!(generation.usage.input_tokens, 40);
    assert_eq!(generation.usage.output_tokens, 3);
}

/// OpenAI streaming ignores the [DONE] marker and reads the usage chunk.
#[tokio::test]
async fn test_openai_streaming() {
    let server = MockServer::start().await;
    let body = [
        json!({"choices": [{"delta": {"role": "assistant"}}]}).to_string(),
        json!({"choices": [{"delta": {"content": "docs: "}}]}).to_string(),
        json!({"choices": [{"delta": {"content": "update readme"}}]}).to_string(),
        json!({"choices": [], "usage": {"prompt_tokens": 90, "completion_tokens": 5}}).to_string(),
        "[DONE]".to_string(),
    ]
    .iter()
    .map(|data| format!("data: {}\n\n", data))
    .collect::<String>();
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({
            "stream": true,
            "stream_options": {"include_usage": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut config = Config {
        provider: "groq".to_string(),
        ..Config::default()
    };
    config
        .custom
        .insert("groq".to_string(), slot(format!("{}/openai/v1", server.uri())));
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new(), &[("GROQ_API_KEY", "gsk")]),
    );

    let mut streamed = String::new();
    let mut on_token = |t: &str| streamed.push_str(t);
    let generation = engine
        .generate(&context(), Some(&mut on_token))
        .await
        .unwrap();

    assert_eq!(generation.text, "docs: update readme");
    assert_eq!(streamed, "docs: update readme");
    assert_eq!(generation.usage.model, "llama-3.3-70b-versatile");
    assert_eq!(generation.usage.input_tokens, 90);
    assert!(engine.cost(&generation.usage).is_some());
}

/// Ollama streaming skips malformed lines and stops on the done marker.
#[tokio::test]
async fn test_ollama_streaming_skips_malformed_lines() {
    let server = MockServer::start().await;
    let body = [
        json!({"message": {"role": "assistant", "content": "chore: "}, "done": false}).to_string(),
        "{this is not json".to_string(),
        json!({"message": {"role": "assistant", "content": "bump deps"}, "done": false}).to_string(),
        json!({"message": {"role": "assistant", "content": ""}, "done": true, "prompt_eval_count": 25, "eval_count": 4}).to_string(),
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let config = Config {
        provider: "ollama".to_string(),
        ollama: slot(server.uri()),
        ..Config::default()
    };
    let engine = Engine::new(config, credentials(MemoryStore::new(), &[]));

    let mut count = 0;
    let mut on_token = |_: &str| count += 1;
    let generation = engine
        .generate(&context(), Some(&mut on_token))
        .await
        .unwrap();

    assert_eq!(generation.text, "chore: bump deps");
    assert_eq!(generation.usage.input_tokens, 25);
    assert_eq!(generation.usage.output_tokens, 4);
    assert_eq!(count, 2);
}

/// Non-2xx answers carry the status and the body's error message.
#[tokio::test]
async fn test_protocol_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "Rate limited"}
        })))
        .mount(&server)
        .await;

    let config = Config {
        provider: "anthropic".to_string(),
        anthropic: slot(format!("{}/v1", server.uri())),
        ..Config::default()
    };
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new().with("anthropic", "sk-ant"), &[]),
    );

    let err = engine.generate(&context(), None).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Protocol { status: 429, message: Some(ref m), .. } if m == "Rate limited"
    ));
}

/// Whitespace-only answers are an empty response, not a success.
#[tokio::test]
async fn test_blank_answer_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "  \n "}}]
        })))
        .mount(&server)
        .await;

    let config = Config {
        provider: "openai".to_string(),
        openai: slot(format!("{}/v1", server.uri())),
        ..Config::default()
    };
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new().with("openai", "sk"), &[]),
    );

    let err = engine.generate(&context(), None).await.unwrap_err();
    assert!(matches!(err, ProviderError::EmptyResponse { .. }));
}

/// A body that is not JSON is a parse error.
#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let config = Config {
        provider: "openai".to_string(),
        openai: slot(format!("{}/v1", server.uri())),
        ..Config::default()
    };
    let engine = Engine::new(
        config,
        credentials(MemoryStore::new().with("openai", "sk"), &[]),
    );

    let err = engine.generate(&context(), None).await.unwrap_err();
    assert!(matches!(err, ProviderError::Parse { .. }));
}

/// Nothing listening is a transport error.
#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let config = Config {
        provider: "ollama".to_string(),
        ollama: slot("http://127.0.0.1:1".to_string()),
        ..Config::default()
    };
    let engine = Engine::new(config, credentials(MemoryStore::new(), &[]));

    let err = engine.generate(&context(), None).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport { .. }));
}

/// A slow server trips the total deadline of a blocking call.
#[tokio::test]
async fn test_total_deadline_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let request = http::client()
        .post(format!("{}/v1/chat/completions", server.uri()))
        .json(&json!({"model": "gpt-4o-mini"}));
    let started = Instant::now();
    let err = http::send("openai", request, Deadline::Total(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        ProviderError::Transport { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("timed out"), "{message}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

/// Streaming calls have no total deadline, but headers must still arrive.
#[tokio::test]
async fn test_header_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let request = http::client()
        .post(format!("{}/v1/messages", server.uri()))
        .json(&json!({"stream": true}));
    let started = Instant::now();
    let err = http::send_within(
        "anthropic",
        request,
        Deadline::Open,
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        ProviderError::Transport { message, .. } => {
            assert_eq!(message, "no response within 0.2s");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

/// Blocking generation through the adapter directly.
#[tokio::test]
async fn test_adapter_blocking_ollama() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "test: cover parser\n"},
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        })))
        .mount(&server)
        .await;

    let config = Config {
        provider: "ollama".to_string(),
        ollama: slot(server.uri()),
        ..Config::default()
    };
    let engine = Engine::new(config, credentials(MemoryStore::new(), &[]));
    let selection = engine.select().unwrap();
    let generation = selection.adapter.generate(&context()).await.unwrap();
    assert_eq!(generation.text, "test: cover parser");
    assert_eq!(generation.usage.output_tokens, 3);
}

/// Model listing for each protocol.
#[tokio::test]
async fn test_fetch_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(query_param("limit", "100"))
        .and(header("x-api-key", "sk-ant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "claude-sonnet-4-6"}, {"id": "claude-haiku-4-5-20251001"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "qwen2.5-coder:7b"}, {"name": "llama3:latest"}]
        })))
        .mount(&server)
        .await;

    let config = Config {
        anthropic: slot(format!("{}/v1", server.uri())),
        ollama: slot(server.uri()),
        ..Config::default()
    };
    let creds = credentials(MemoryStore::new().with("anthropic", "sk-ant"), &[]);

    let anthropic = config.try_resolve_provider("anthropic").unwrap();
    let key = creds.resolve("anthropic", anthropic.env_var.as_deref());
    let models = fetch_models(&anthropic, &key).await.unwrap();
    assert_eq!(models, vec!["claude-haiku-4-5-20251001", "claude-sonnet-4-6"]);

    let ollama = config.try_resolve_provider("ollama").unwrap();
    let models = fetch_models(&ollama, &key).await.unwrap();
    assert_eq!(models, vec!["llama3", "qwen2.5-coder:7b"]);
}
