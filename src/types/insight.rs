//! Values the assistant hands back to callers

use serde::{Deserialize, Serialize};

/// A usage pattern the model spotted in a user's recent activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInsight {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Outcome of a conversational reply.
///
/// Expected failures are values, not errors: the route layer turns
/// [`ChatReply::QuotaExceeded`] into a 503 and [`ChatReply::Failed`] into a
/// message for the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Text(String),
    QuotaExceeded,
    Failed(String),
}

impl ChatReply {
    /// The reply text, if the call succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatReply::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Error label for the failure cases (`QUOTA_EXCEEDED` for quota).
    pub fn error(&self) -> Option<&str> {
        match self {
            ChatReply::Text(_) => None,
            ChatReply::QuotaExceeded => Some("QUOTA_EXCEEDED"),
            ChatReply::Failed(msg) => Some(msg),
        }
    }
}

/// Outcome of reading consumption units off a bill photo.
#[derive(Debug, Clone, PartialEq)]
pub enum BillExtraction {
    Units(f64),
    /// User-facing message; the raw service error is only logged.
    Failed(String),
}
