//! Footprint error types

use std::time::Duration;

/// Footprint error types
#[derive(Debug, thiserror::Error)]
pub enum FootprintError {
    // Transport/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server-side failure (5xx).
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Caller-side failure reported by the service (4xx other than 429).
    #[error("client error ({status}): {body}")]
    Client { status: u16, body: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The account quota is spent; retrying will not help until it resets.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // Configuration / lifecycle errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("admission queue is closed")]
    QueueClosed,
}

impl FootprintError {
    /// Whether another attempt could succeed.
    ///
    /// 429s that were not classified as quota exhaustion, 5xx responses and
    /// transport failures are transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            FootprintError::RateLimited { .. } | FootprintError::Http(_) => true,
            FootprintError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the failure means the service is out of capacity for us.
    ///
    /// A 429 that survived every retry counts too: callers show the same
    /// "temporarily unavailable" message either way.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            FootprintError::QuotaExceeded(_) | FootprintError::RateLimited { .. }
        )
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FootprintError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status a route layer should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            e if e.is_quota() => 503,
            FootprintError::QueueClosed => 503,
            FootprintError::InvalidInput(_)
            | FootprintError::Client { .. }
            | FootprintError::Conflict(_) => 400,
            FootprintError::Api { status, .. } if *status >= 500 => *status,
            _ => 500,
        }
    }
}

/// Result type alias for Footprint operations
pub type Result<T> = std::result::Result<T, FootprintError>;
