//! The network seam under the retry executor.
//!
//! [`Transport`] performs exactly one HTTP exchange and reports what came
//! back; it never retries or classifies. [`HttpTransport`] is the reqwest
//! implementation. Tests plug in scripted transports.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{FootprintError, Result};

/// Default HTTP timeout for a single exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed to perform one outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    pub method: reqwest::Method,
    /// Fully-formed URL, including the `key` query parameter.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl CallDescriptor {
    /// `POST` with a JSON body.
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    /// URL with the query string removed, safe to log.
    pub fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

/// Response body: parsed JSON, or the raw text when it is not JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Raw(String),
}

impl ResponseBody {
    /// Parse `text` as JSON, keeping it as raw text on failure.
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Raw(text),
        }
    }

    /// Body as text, for error messages and marker matching.
    pub fn render(&self) -> String {
        match self {
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Raw(text) => text.clone(),
        }
    }
}

/// One HTTP response as seen by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl RawResponse {
    /// Response with a JSON body and no headers.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: ResponseBody::Json(body),
        }
    }

    /// Response whose body is parsed leniently from text.
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: ResponseBody::from_text(text.into()),
        }
    }

    /// Add a header (name is lowercased).
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Performs a single outbound exchange.
///
/// Implementations return `Err(FootprintError::Http)` only for transport
/// failures (connect, timeout, unreadable body). Any HTTP status, including
/// errors, is an `Ok(RawResponse)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: &CallDescriptor) -> Result<RawResponse>;
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                FootprintError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: &CallDescriptor) -> Result<RawResponse> {
        let mut request = self.http.request(call.method.clone(), &call.url);
        for (name, value) in &call.headers {
            request = request.header(name, value);
        }

        let response = request
            .body(call.body.to_string())
            .send()
            .await
            .map_err(|e| FootprintError::Http(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| FootprintError::Http(e.without_url().to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body: ResponseBody::from_text(text),
        })
    }
}
