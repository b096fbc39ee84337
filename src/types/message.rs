//! Conversation turns as callers hand them in

use serde::{Deserialize, Serialize};

/// Role of a conversation participant, as the generation service names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Map a free-form role label onto the two recognised roles.
    ///
    /// `assistant` and `model` become [`Role::Model`]; anything else is the user.
    pub fn from_label(label: &str) -> Self {
        match label {
            "assistant" | "model" => Role::Model,
            _ => Role::User,
        }
    }
}

/// One piece of a structured turn. Either field may carry the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl HistoryPart {
    /// The text of this part, preferring `text` over `content`.
    pub fn as_text(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.content.as_deref())
            .unwrap_or_default()
    }
}

/// A caller-supplied history turn.
///
/// Front-ends send several shapes: `{role, parts: [{text}]}`,
/// `{role, content}` or `{role, text}`. All of them deserialize into this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<HistoryPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl HistoryTurn {
    /// Create a plain-text user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create a plain-text assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            text: Some(text.into()),
            ..Self::default()
        }
    }
}
