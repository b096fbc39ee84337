//! Retry configuration, response classification, and the retrying executor.
//!
//! [`Executor::execute`] performs one logical call: it sends through a
//! [`Transport`], turns each raw response into a [`CallOutcome`] with
//! [`classify`], and sleeps between transient failures. All retry paths
//! share one attempt ceiling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use super::transport::{CallDescriptor, RawResponse, ResponseBody, Transport};
use crate::telemetry;
use crate::{FootprintError, Result};

/// Phrases in a 429 body that mean the quota is spent, matched lowercase.
const QUOTA_MARKERS: &[&str] = &["resource_exhausted", "quota exceeded", "quota", "exceeded"];

/// A 429 body carrying this means the account has no allowance at all.
const HARD_ZERO_MARKER: &str = "limit: 0";

/// Configuration for retry behaviour on transient errors.
///
/// Each failure kind has its own exponential schedule
/// (`base * 2^attempt + jitter`), all capped at `max_delay`:
///
/// ```rust
/// # use footprint::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(4)
///     .server_base(Duration::from_millis(200))
///     .jitter(false);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request). Default: 6.
    pub max_attempts: u32,
    /// Ceiling for every computed delay, including server hints. Default: 60s.
    pub max_delay: Duration,
    /// Backoff base for 429 responses without a hint. Default: 15s.
    pub rate_limit_base: Duration,
    /// Maximum jitter added on the 429 path. Default: 1s.
    pub rate_limit_jitter: Duration,
    /// Backoff base for 5xx responses. Default: 1s.
    pub server_base: Duration,
    /// Maximum jitter added on the 5xx path. Default: 500ms.
    pub server_jitter: Duration,
    /// Backoff base for transport failures. Default: 2s.
    pub network_base: Duration,
    /// Maximum jitter added on the network path. Default: 500ms.
    pub network_jitter: Duration,
    /// Whether to add random jitter to computed backoff. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            max_delay: Duration::from_secs(60),
            rate_limit_base: Duration::from_secs(15),
            rate_limit_jitter: Duration::from_secs(1),
            server_base: Duration::from_secs(1),
            server_jitter: Duration::from_millis(500),
            network_base: Duration::from_secs(2),
            network_jitter: Duration::from_millis(500),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the ceiling applied to every delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff base for rate-limited responses.
    pub fn rate_limit_base(mut self, delay: Duration) -> Self {
        self.rate_limit_base = delay;
        self
    }

    /// Set the backoff base for server errors.
    pub fn server_base(mut self, delay: Duration) -> Self {
        self.server_base = delay;
        self
    }

    /// Set the backoff base for transport failures.
    pub fn network_base(mut self, delay: Duration) -> Self {
        self.network_base = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// `base * 2^attempt` plus up to `max_jitter`, capped at `max_delay`.
    pub fn backoff(&self, base: Duration, max_jitter: Duration, attempt: u32) -> Duration {
        let exp = base.saturating_mul(2u32.saturating_pow(attempt));
        let jitter = if self.jitter {
            max_jitter.mul_f64(rand::random::<f64>())
        } else {
            Duration::ZERO
        };
        exp.saturating_add(jitter).min(self.max_delay)
    }

    /// Delay after a non-exhausted 429.
    ///
    /// Priority: `retry-after` header, then a `RetryInfo.retryDelay` hint in
    /// the body, then the 429 backoff schedule. Each is capped at `max_delay`.
    pub fn rate_limit_delay(&self, response: &RawResponse, attempt: u32) -> Duration {
        retry_after_header(response)
            .or_else(|| retry_delay_hint(&response.body))
            .map(|hint| hint.min(self.max_delay))
            .unwrap_or_else(|| self.backoff(self.rate_limit_base, self.rate_limit_jitter, attempt))
    }
}

/// Why an attempt is being retried. Used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Server,
    Network,
}

impl RetryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RetryReason::RateLimited => "rate_limited",
            RetryReason::Server => "server",
            RetryReason::Network => "network",
        }
    }
}

/// Classified result of one attempt.
#[derive(Debug)]
pub enum CallOutcome {
    Success(serde_json::Value),
    Retryable {
        delay: Duration,
        reason: RetryReason,
        error: FootprintError,
    },
    Fatal(FootprintError),
}

/// Classify one raw response. `attempt` is 0-indexed.
pub fn classify(attempt: u32, response: &RawResponse, config: &RetryConfig) -> CallOutcome {
    match response.status {
        200..=299 => match &response.body {
            ResponseBody::Json(value) => CallOutcome::Success(value.clone()),
            ResponseBody::Raw(_) => CallOutcome::Retryable {
                delay: config.backoff(config.network_base, config.network_jitter, attempt),
                reason: RetryReason::Network,
                error: FootprintError::Http("malformed response body".to_string()),
            },
        },
        429 => {
            let text = response.body.render().to_lowercase();
            let hard_zero = text.contains(HARD_ZERO_MARKER);
            let exhausted = QUOTA_MARKERS.iter().any(|m| text.contains(m));
            if hard_zero || (exhausted && attempt >= 1) {
                return CallOutcome::Fatal(FootprintError::QuotaExceeded(response.body.render()));
            }
            let delay = config.rate_limit_delay(response, attempt);
            CallOutcome::Retryable {
                delay,
                reason: RetryReason::RateLimited,
                error: FootprintError::RateLimited {
                    retry_after: Some(delay),
                },
            }
        }
        status @ 400..=499 => CallOutcome::Fatal(FootprintError::Client {
            status,
            body: response.body.render(),
        }),
        status @ 500.. => CallOutcome::Retryable {
            delay: config.backoff(config.server_base, config.server_jitter, attempt),
            reason: RetryReason::Server,
            error: FootprintError::Api {
                status,
                message: response.body.render(),
            },
        },
        status => CallOutcome::Fatal(FootprintError::Api {
            status,
            message: format!("unexpected response: {}", response.body.render()),
        }),
    }
}

fn retry_after_header(response: &RawResponse) -> Option<Duration> {
    let secs: f64 = response.header("retry-after")?.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| hint_duration(secs))
}

/// `error.details[].retryDelay` (e.g. `"42s"`) of the `RetryInfo` detail.
fn retry_delay_hint(body: &ResponseBody) -> Option<Duration> {
    let ResponseBody::Json(value) = body else {
        return None;
    };
    let delay = value
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .find(|d| {
            d.get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t.contains("RetryInfo"))
        })?
        .get("retryDelay")?
        .as_str()?;
    let secs: f64 = delay.trim().trim_end_matches('s').parse().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| hint_duration(secs))
}

/// Seconds from a server hint; values past `Duration::MAX` saturate.
fn hint_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Sends calls through a [`Transport`] and retries transient failures.
pub struct Executor {
    transport: Arc<dyn Transport>,
    config: RetryConfig,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, config: RetryConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Perform `call`, retrying transient failures up to `max_attempts`.
    ///
    /// Returns the parsed success body, the first fatal error, or the last
    /// transient error once the attempt ceiling is reached. No sleep follows
    /// the final attempt.
    pub async fn execute(&self, call: &CallDescriptor) -> Result<serde_json::Value> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 0..max_attempts {
            let outcome = match self.transport.send(call).await {
                Ok(response) => classify(attempt, &response, &self.config),
                Err(e) if e.is_transient() => CallOutcome::Retryable {
                    delay: self.config.backoff(
                        self.config.network_base,
                        self.config.network_jitter,
                        attempt,
                    ),
                    reason: RetryReason::Network,
                    error: e,
                },
                Err(e) => CallOutcome::Fatal(e),
            };

            match outcome {
                CallOutcome::Success(value) => return Ok(value),
                CallOutcome::Fatal(e) => {
                    if matches!(e, FootprintError::QuotaExceeded(_)) {
                        metrics::counter!(telemetry::QUOTA_EXHAUSTED_TOTAL).increment(1);
                        warn!(attempt = attempt + 1, "quota exhausted, not retrying");
                    }
                    return Err(e);
                }
                CallOutcome::Retryable {
                    delay,
                    reason,
                    error,
                } => {
                    if attempt + 1 < max_attempts {
                        metrics::counter!(telemetry::RETRIES_TOTAL, "reason" => reason.as_str())
                            .increment(1);
                        warn!(
                            url = call.redacted_url(),
                            reason = reason.as_str(),
                            attempt = attempt + 1,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying after transient error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_err = Some(error);
                }
            }
        }

        let err = last_err
            .unwrap_or_else(|| FootprintError::Http("no attempt was made".to_string()));
        error!(max_attempts, error = %err, "max retries reached");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_jitter() -> RetryConfig {
        RetryConfig::new().jitter(false)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = no_jitter();
        let base = Duration::from_secs(1);
        assert_eq!(config.backoff(base, Duration::ZERO, 0), Duration::from_secs(1));
        assert_eq!(config.backoff(base, Duration::ZERO, 3), Duration::from_secs(8));
        assert_eq!(config.backoff(base, Duration::ZERO, 10), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let config = RetryConfig::new();
        for _ in 0..50 {
            let d = config.backoff(Duration::from_secs(2), Duration::from_millis(500), 0);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn success_returns_body() {
        let response = RawResponse::json(200, json!({"candidates": []}));
        assert!(matches!(
            classify(0, &response, &no_jitter()),
            CallOutcome::Success(_)
        ));
    }

    #[test]
    fn unparsable_success_is_retryable() {
        let response = RawResponse::text(200, "not json");
        assert!(matches!(
            classify(0, &response, &no_jitter()),
            CallOutcome::Retryable {
                reason: RetryReason::Network,
                ..
            }
        ));
    }

    #[test]
    fn client_error_is_fatal_with_body() {
        let response = RawResponse::text(400, "bad request body");
        match classify(0, &response, &no_jitter()) {
            CallOutcome::Fatal(FootprintError::Client { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad request body");
            }
            other => panic!("expected client error, got {other:?}"),
        }
    }

    #[test]
    fn server_error_is_retryable() {
        let response = RawResponse::text(503, "<html>unavailable</html>");
        match classify(2, &response, &no_jitter()) {
            CallOutcome::Retryable { delay, reason, .. } => {
                assert_eq!(reason, RetryReason::Server);
                assert_eq!(delay, Duration::from_secs(4));
            }
            other => panic!("expected retryable, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_prefers_header() {
        let response = RawResponse::json(
            429,
            json!({"error": {"details": [{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "42s"}]}}),
        )
        .with_header("retry-after", "5");
        match classify(0, &response, &no_jitter()) {
            CallOutcome::Retryable { delay, .. } => assert_eq!(delay, Duration::from_secs(5)),
            other => panic!("expected retryable, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_uses_body_hint() {
        let response = RawResponse::json(
            429,
            json!({"error": {"details": [
                {"@type": "type.googleapis.com/google.rpc.Help"},
                {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "42s"}
            ]}}),
        );
        match classify(0, &response, &no_jitter()) {
            CallOutcome::Retryable { delay, .. } => assert_eq!(delay, Duration::from_secs(42)),
            other => panic!("expected retryable, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_hints_are_capped() {
        let response = RawResponse::json(429, json!({})).with_header("retry-after", "300");
        match classify(0, &response, &no_jitter()) {
            CallOutcome::Retryable { delay, .. } => assert_eq!(delay, Duration::from_secs(60)),
            other => panic!("expected retryable, got {other:?}"),
        }
    }

    #[test]
    fn oversized_hints_saturate_to_cap() {
        let header =
            RawResponse::json(429, json!({})).with_header("retry-after", "99999999999999999999");
        match classify(0, &header, &no_jitter()) {
            CallOutcome::Retryable { delay, .. } => assert_eq!(delay, Duration::from_secs(60)),
            other => panic!("expected retryable, got {other:?}"),
        }

        let body = RawResponse::json(
            429,
            json!({"error": {"details": [
                {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "1e25s"}
            ]}}),
        );
        match classify(0, &body, &no_jitter()) {
            CallOutcome::Retryable { delay, .. } => assert_eq!(delay, Duration::from_secs(60)),
            other => panic!("expected retryable, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_falls_back_to_backoff() {
        let response = RawResponse::json(429, json!({"error": {"message": "slow down"}}));
        match classify(1, &response, &no_jitter()) {
            CallOutcome::Retryable { delay, .. } => assert_eq!(delay, Duration::from_secs(30)),
            other => panic!("expected retryable, got {other:?}"),
        }
    }

    #[test]
    fn quota_marker_tolerated_on_first_attempt() {
        let response =
            RawResponse::json(429, json!({"error": {"status": "RESOURCE_EXHAUSTED"}}));
        assert!(matches!(
            classify(0, &response, &no_jitter()),
            CallOutcome::Retryable { .. }
        ));
        assert!(matches!(
            classify(1, &response, &no_jitter()),
            CallOutcome::Fatal(FootprintError::QuotaExceeded(_))
        ));
    }

    #[test]
    fn hard_zero_limit_fails_immediately() {
        let response = RawResponse::text(429, "Quota metric xyz, limit: 0, model flash");
        assert!(matches!(
            classify(0, &response, &no_jitter()),
            CallOutcome::Fatal(FootprintError::QuotaExceeded(_))
        ));
    }

    #[test]
    fn redirect_is_fatal() {
        let response = RawResponse::text(302, "");
        assert!(matches!(
            classify(0, &response, &no_jitter()),
            CallOutcome::Fatal(FootprintError::Api { status: 302, .. })
        ));
    }
}
