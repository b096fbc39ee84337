//! Tests for the retrying executor.
//!
//! A scripted transport replays canned responses and records when each call
//! arrived; tokio's paused clock makes the waits between them deterministic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use footprint::gateway::{CallDescriptor, Executor, RawResponse, RetryConfig, Transport};
use footprint::{FootprintError, Result};
use serde_json::json;
use tokio::time::Instant;

/// Mock transport that replays a script, then keeps answering 200.
struct Scripted {
    script: Mutex<VecDeque<Result<RawResponse>>>,
    calls: Mutex<Vec<Instant>>,
}

impl Scripted {
    fn new(script: Vec<Result<RawResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn gap(&self, i: usize) -> Duration {
        let calls = self.calls.lock().unwrap();
        calls[i + 1] - calls[i]
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn send(&self, _call: &CallDescriptor) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ok_body()))
    }
}

fn ok_body() -> RawResponse {
    RawResponse::json(200, json!({"candidates": []}))
}

fn call() -> CallDescriptor {
    CallDescriptor::post_json("http://localhost/generate?key=k", json!({}))
}

/// Paused-clock sleeps may land a tick late; allow for that.
fn assert_waited(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "waited {actual:?}, expected {expected:?}"
    );
}

fn no_jitter() -> RetryConfig {
    RetryConfig::new().jitter(false)
}

#[tokio::test(start_paused = true)]
async fn retry_after_header_is_honoured() {
    let transport = Scripted::new(vec![Ok(RawResponse::json(
        429,
        json!({"error": {"message": "Too many requests"}}),
    )
    .with_header("Retry-After", "5"))]);
    let executor = Executor::new(transport.clone(), no_jitter());

    let result = executor.execute(&call()).await;

    assert!(result.is_ok());
    assert_eq!(transport.call_count(), 2);
    assert!(transport.gap(0) >= Duration::from_secs(5));
    assert!(transport.gap(0) < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn retry_delay_hint_in_body_is_honoured() {
    let body = json!({
        "error": {
            "code": 429,
            "message": "Too many requests",
            "details": [{
                "@type": "type.googleapis.com/google.rpc.RetryInfo",
                "retryDelay": "42s"
            }]
        }
    });
    let transport = Scripted::new(vec![Ok(RawResponse::json(429, body))]);
    let executor = Executor::new(transport.clone(), no_jitter());

    executor.execute(&call()).await.unwrap();

    assert_waited(transport.gap(0), Duration::from_secs(42));
}

#[tokio::test(start_paused = true)]
async fn quota_on_second_attempt_stops_retrying() {
    let quota = || {
        Ok(RawResponse::json(
            429,
            json!({"error": {"status": "RESOURCE_EXHAUSTED", "message": "Quota exceeded for metric"}}),
        ))
    };
    let transport = Scripted::new(vec![quota(), quota(), quota()]);
    let executor = Executor::new(transport.clone(), no_jitter());

    let err = executor.execute(&call()).await.unwrap_err();

    assert!(matches!(err, FootprintError::QuotaExceeded(_)), "got {err:?}");
    assert!(err.is_quota());
    assert_eq!(transport.call_count(), 2);
    // First 429 falls back to the 15s schedule.
    assert_waited(transport.gap(0), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn zero_allowance_fails_on_first_attempt() {
    let transport = Scripted::new(vec![Ok(RawResponse::text(
        429,
        "Quota exceeded for metric: generate_requests, limit: 0",
    ))]);
    let executor = Executor::new(transport.clone(), no_jitter());

    let err = executor.execute(&call()).await.unwrap_err();

    assert!(matches!(err, FootprintError::QuotaExceeded(_)));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn client_error_is_not_retried() {
    let transport = Scripted::new(vec![Ok(RawResponse::json(
        400,
        json!({"error": {"message": "Invalid argument"}}),
    ))]);
    let executor = Executor::new(transport.clone(), no_jitter());

    let err = executor.execute(&call()).await.unwrap_err();

    match err {
        FootprintError::Client { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid argument"));
        }
        other => panic!("expected client error, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn server_errors_back_off_exponentially() {
    let transport = Scripted::new(vec![
        Ok(RawResponse::text(503, "unavailable")),
        Ok(RawResponse::text(500, "internal")),
    ]);
    let executor = Executor::new(transport.clone(), no_jitter());

    let value = executor.execute(&call()).await.unwrap();

    assert_eq!(value, json!({"candidates": []}));
    assert_eq!(transport.call_count(), 3);
    assert_waited(transport.gap(0), Duration::from_secs(1));
    assert_waited(transport.gap(1), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn network_errors_are_retried() {
    let transport = Scripted::new(vec![
        Err(FootprintError::Http("connection reset".into())),
        Err(FootprintError::Http("timed out".into())),
    ]);
    let executor = Executor::new(transport.clone(), no_jitter());

    executor.execute(&call()).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    assert_waited(transport.gap(0), Duration::from_secs(2));
    assert_waited(transport.gap(1), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn non_transient_transport_error_is_fatal() {
    let transport = Scripted::new(vec![Err(FootprintError::Configuration("bad".into()))]);
    let executor = Executor::new(transport.clone(), no_jitter());

    let err = executor.execute(&call()).await.unwrap_err();

    assert!(matches!(err, FootprintError::Configuration(_)));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn attempts_capped_at_six() {
    let script = (0..10)
        .map(|_| Ok(RawResponse::text(502, "bad gateway")))
        .collect();
    let transport = Scripted::new(script);
    let executor = Executor::new(transport.clone(), no_jitter());

    let started = Instant::now();
    let err = executor.execute(&call()).await.unwrap_err();

    assert!(matches!(err, FootprintError::Api { status: 502, .. }));
    assert_eq!(transport.call_count(), 6);
    // 1 + 2 + 4 + 8 + 16 seconds; nothing after the last attempt.
    assert_waited(started.elapsed(), Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn delays_never_exceed_cap() {
    let script = (0..6)
        .map(|_| Ok(RawResponse::text(429, "slow down")))
        .collect();
    let transport = Scripted::new(script);
    let executor = Executor::new(transport.clone(), RetryConfig::new());

    let err = executor.execute(&call()).await.unwrap_err();

    assert!(matches!(err, FootprintError::RateLimited { .. }));
    assert_eq!(transport.call_count(), 6);
    for i in 0..5 {
        assert!(
            transport.gap(i) < Duration::from_millis(60_050),
            "gap {i} too long"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn disabled_config_makes_one_attempt() {
    let transport = Scripted::new(vec![Ok(RawResponse::text(503, "unavailable"))]);
    let executor = Executor::new(transport.clone(), RetryConfig::disabled());

    assert!(executor.execute(&call()).await.is_err());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_success_body_is_retried() {
    let transport = Scripted::new(vec![Ok(RawResponse::text(200, "<html>proxy</html>"))]);
    let executor = Executor::new(transport.clone(), no_jitter());

    executor.execute(&call()).await.unwrap();

    assert_eq!(transport.call_count(), 2);
}
