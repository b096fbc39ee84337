//! The single choke-point for calls to the generation service.
//!
//! [`Gateway`] owns the process-wide state every adapter shares: the
//! response cache, the admission queue and the retrying executor, plus the
//! endpoint and the credential source. Construct one per process with
//! [`Gateway::builder`] and hand it to adapters behind an `Arc`.

mod builder;
pub mod queue;
pub mod retry;
pub mod transport;

pub use builder::GatewayBuilder;
pub use queue::{AdmissionQueue, QueueConfig};
pub use retry::{CallOutcome, Executor, RetryConfig, RetryReason, classify};
pub use transport::{CallDescriptor, HttpTransport, RawResponse, ResponseBody, Transport};

use std::time::Instant;

use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::ApiKeySource;
use crate::gemini::{GenerateRequest, GenerateResponse};
use crate::telemetry;
use crate::{FootprintError, Result};

/// Shared gateway state: cache, admission queue and executor.
pub struct Gateway {
    cache: ResponseCache,
    queue: AdmissionQueue,
    executor: Executor,
    endpoint: String,
    api_key: ApiKeySource,
}

impl Gateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one `generateContent` request through the queue and executor.
    ///
    /// The credential is resolved here, on every call; a missing key fails
    /// fast with [`FootprintError::Configuration`](crate::FootprintError::Configuration)
    /// and never reaches the queue.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let key = self.api_key.resolve()?;
        let call = CallDescriptor::post_json(self.keyed_url(&key)?, serde_json::to_value(request)?);

        let started = Instant::now();
        let result = self
            .queue
            .submit(|| self.executor.execute(&call))
            .await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        debug!(
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gateway call finished"
        );

        Ok(serde_json::from_value(result?)?)
    }

    /// The endpoint with `key` appended to its query string, percent-encoded.
    fn keyed_url(&self, key: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            FootprintError::Configuration(format!("invalid endpoint {:?}: {e}", self.endpoint))
        })?;
        url.query_pairs_mut().append_pair("key", key);
        Ok(url.into())
    }

    /// Drop every cached response.
    pub fn reset(&self) {
        self.cache.clear();
    }

    /// Stop admitting calls. Waiting and later submissions fail with
    /// [`FootprintError::QueueClosed`](crate::FootprintError::QueueClosed).
    pub fn shutdown(&self) {
        self.queue.close();
    }
}
