//! Wire types for the Gemini `generateContent` endpoint.
//!
//! Only the subset the assistant sends and reads is modelled. See:
//! <https://ai.google.dev/api/generate-content>

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Role;

/// Default endpoint for the text/vision generation model.
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent";

/// Request body for `generateContent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    /// A request built from the given turns, without generation settings.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            generation_config: None,
        }
    }

    /// Attach generation settings.
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

/// One conversation turn on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// Single-part text turn.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::text(text)],
        }
    }
}

/// A part of a turn: text or inline binary data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Inline image part; `bytes` are base64-encoded here.
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// Successful response body. Missing or `null` fields deserialize as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parts: Vec<CandidatePart>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if non-empty.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_request_shape() {
        let request = GenerateRequest::new(vec![Content::text(Role::User, "hi")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }

    #[test]
    fn image_request_shape() {
        let request = GenerateRequest::new(vec![Content {
            role: Role::User,
            parts: vec![Part::inline("image/png", b"abc"), Part::text("units?")],
        }])
        .with_config(GenerationConfig {
            temperature: Some(0.0),
            max_output_tokens: Some(20),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["contents"][0]["parts"][0],
            json!({"inlineData": {"mimeType": "image/png", "data": "YWJj"}})
        );
        assert_eq!(
            value["generationConfig"],
            json!({"temperature": 0.0, "maxOutputTokens": 20})
        );
    }

    #[test]
    fn first_text_extraction() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "hello"}, {"text": "x"}]}}]
        }))
        .unwrap();
        assert_eq!(response.first_text(), Some("hello"));
    }

    #[test]
    fn first_text_missing() {
        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.first_text(), None);

        let no_parts: GenerateResponse =
            serde_json::from_value(json!({"candidates": [{"content": {"parts": []}}]})).unwrap();
        assert_eq!(no_parts.first_text(), None);

        let blank: GenerateResponse =
            serde_json::from_value(json!({"candidates": [{"content": {"parts": [{"text": ""}]}}]}))
                .unwrap();
        assert_eq!(blank.first_text(), None);
    }

    #[test]
    fn null_fields_read_as_empty() {
        let no_candidates: GenerateResponse =
            serde_json::from_value(json!({"candidates": null})).unwrap();
        assert_eq!(no_candidates.first_text(), None);

        let null_parts: GenerateResponse =
            serde_json::from_value(json!({"candidates": [{"content": {"parts": null}}]})).unwrap();
        assert_eq!(null_parts.first_text(), None);

        let null_content: GenerateResponse =
            serde_json::from_value(json!({"candidates": [{"content": null}]})).unwrap();
        assert_eq!(null_content.first_text(), None);
    }
}
