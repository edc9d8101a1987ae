use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use nova_backend::config::Config;
use nova_backend::error::NovaError;
use nova_backend::providers::GeminiClient;

const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

fn dispatcher_config(base_url: String, attempts: u32) -> Config {
    Config {
        api_key: Some("test-key".to_string()),
        base_url,
        retry_attempts: attempts,
        retry_base_delay: Duration::from_millis(1),
        ..Config::default()
    }
}

/// Serves 429 for the first `failures` calls, then a well-formed reply.
/// Records the call count and the credential header it saw.
async fn spawn_flaky_upstream(
    failures: usize,
) -> (String, Arc<AtomicUsize>, Arc<Mutex<Option<String>>>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen_key = Arc::new(Mutex::new(None));

    let calls_handler = Arc::clone(&calls);
    let seen_handler = Arc::clone(&seen_key);
    let app = Router::new().route(
        GENERATE_PATH,
        post(move |headers: HeaderMap| {
            let calls = Arc::clone(&calls_handler);
            let seen = Arc::clone(&seen_handler);
            async move {
                if let Some(key) = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
                    *seen.lock().unwrap() = Some(key.to_string());
                }
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call <= failures {
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        Json(json!({"error": {"message": "quota exceeded"}})),
                    )
                        .into_response()
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({
                            "candidates": [{"content": {"parts": [{"text": "toparlandım"}]}}]
                        })),
                    )
                        .into_response()
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), calls, seen_key)
}

#[tokio::test]
async fn dispatcher_retries_through_rate_limiting() {
    let (base_url, calls, seen_key) = spawn_flaky_upstream(2).await;
    let client = GeminiClient::new(&dispatcher_config(base_url, 3));

    let reply = client.generate("Selam", 1.0).await.unwrap();
    assert_eq!(reply, "toparlandım");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(seen_key.lock().unwrap().as_deref(), Some("test-key"));
}

#[tokio::test]
async fn dispatcher_stops_at_the_attempt_budget() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(429)
                .json_body(json!({"error": {"message": "quota exceeded"}}));
        })
        .await;

    let client = GeminiClient::new(&dispatcher_config(server.base_url(), 3));
    let err = client.generate("Selam", 1.0).await.unwrap_err();

    assert!(matches!(err, NovaError::Upstream(_)));
    let text = err.to_string();
    assert!(text.contains("after 3 attempts"), "unexpected error: {text}");
    upstream.assert_calls(3);
}

#[tokio::test]
async fn dispatcher_counts_transport_errors_against_the_budget() {
    // Nothing listens here; every attempt fails at connect time.
    let client = GeminiClient::new(&dispatcher_config("http://127.0.0.1:9".to_string(), 2));

    let err = client.generate("Selam", 1.0).await.unwrap_err();
    assert!(matches!(err, NovaError::Upstream(_)));
    assert!(err.to_string().contains("after 2 attempts"));
}

#[tokio::test]
async fn dispatcher_requires_a_key_before_dialing_out() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).json_body(json!({"candidates": []}));
        })
        .await;

    let config = Config {
        api_key: None,
        ..dispatcher_config(server.base_url(), 3)
    };
    let client = GeminiClient::new(&config);

    let err = client.generate("Selam", 1.0).await.unwrap_err();
    assert!(matches!(err, NovaError::Config(_)));
    assert!(err
        .to_string()
        .contains("GEMINI_API_KEY çevresel değişkeni tanımlı değil"));
    upstream.assert_calls(0);
}
