//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use super::transport::{DEFAULT_TIMEOUT, HttpTransport, Transport};
use super::{AdmissionQueue, Executor, Gateway, QueueConfig, RetryConfig};
use crate::Result;
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::{ApiKeySource, Config};
use crate::gemini::DEFAULT_ENDPOINT;

/// Builder for [`Gateway`].
///
/// ```rust,no_run
/// # use footprint::Gateway;
/// # fn main() -> footprint::Result<()> {
/// let gateway = Gateway::builder()
///     .api_key_env("GEMINI_API_KEY")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct GatewayBuilder {
    endpoint: String,
    api_key: ApiKeySource,
    transport: Option<Arc<dyn Transport>>,
    timeout: Duration,
    retry: RetryConfig,
    queue: QueueConfig,
    cache: CacheConfig,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: ApiKeySource::default(),
            transport: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Start from a loaded [`Config`]. Reads the key from the env var named
    /// in `config.gemini.api_key_env`.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .endpoint(config.gemini.endpoint.clone())
            .api_key_env(config.gemini.api_key_env.clone())
            .timeout(Duration::from_secs(config.gemini.timeout_secs))
            .retry(RetryConfig::from(&config.retry))
            .queue(QueueConfig::from(&config.queue))
            .cache(CacheConfig::from(&config.cache))
    }

    /// Set the `generateContent` URL (without the key).
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Use a fixed API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = ApiKeySource::Static(key.into());
        self
    }

    /// Read the API key from an environment variable on every call.
    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key = ApiKeySource::Env(var.into());
        self
    }

    pub fn api_key_source(mut self, source: ApiKeySource) -> Self {
        self.api_key = source;
        self
    }

    /// Replace the HTTP transport (scripted transports in tests).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Per-request HTTP timeout for the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn queue(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Build the gateway.
    ///
    /// Does not check the credential; that happens per call.
    pub fn build(self) -> Result<Gateway> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::with_timeout(self.timeout)?),
        };

        Ok(Gateway {
            cache: ResponseCache::new(&self.cache),
            queue: AdmissionQueue::new(&self.queue),
            executor: Executor::new(transport, self.retry),
            endpoint: self.endpoint,
            api_key: self.api_key,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
