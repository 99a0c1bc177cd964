// ABOUTME: Integration tests verifying modules work together.
// ABOUTME: Runs the dispatcher over the real HTTP transport against a mock server.

use std::time::Duration;

use pacer::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> DispatcherConfig {
    DispatcherConfig::new(server.uri(), 5, Duration::from_secs(10)).with_concurrency_limit(2)
}

#[tokio::test]
async fn test_dispatcher_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 42})))
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::http(config_for(&server)).unwrap();

    let results: Vec<Result<Outcome<Value>, DispatchError>> = dispatcher
        .send_all((0..3).map(|_| Call::get("/data")))
        .await;

    for result in results {
        assert_eq!(result.unwrap().into_success(), Some(json!({"value": 42})));
    }

    dispatcher.close().await.unwrap();
    assert!(matches!(
        dispatcher
            .send::<Value>(Method::GET, "/data", RequestOptions::new())
            .await,
        Err(DispatchError::Closed)
    ));
}

#[tokio::test]
async fn test_rate_limited_then_success_over_http() {
    let server = MockServer::start().await;
    Mock::given(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::http(config_for(&server)).unwrap();
    let outcome: Outcome<Value> = dispatcher
        .send(Method::GET, "/busy", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Success(json!({"ok": true})));
}

#[tokio::test]
async fn test_server_errors_exhaust() {
    let server = MockServer::start().await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    // Two attempts means a single backoff of base^0 = 1s.
    let config = config_for(&server).with_max_attempts(2);
    let dispatcher = Dispatcher::http(config).unwrap();

    let outcome: Outcome<Value> = dispatcher
        .send(Method::GET, "/broken", RequestOptions::new())
        .await
        .unwrap();

    let exhaustion = outcome.exhaustion().expect("should be exhausted");
    assert_eq!(exhaustion.attempts, 2);
    assert_eq!(
        exhaustion.last_failure,
        AttemptFailure::Status(StatusCode::INTERNAL_SERVER_ERROR)
    );
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = DispatcherConfig::new("http://localhost", 0, Duration::from_secs(1));
    let result = Dispatcher::http(config);
    assert!(matches!(
        result,
        Err(PacerError::Config(ConfigError::Invalid(_)))
    ));
}
