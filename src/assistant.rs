//! Carbon assistant: the four call sites built on the gateway.
//!
//! Every adapter builds a fingerprint and a payload, consults the shared
//! cache, goes through the gateway on a miss, and repairs what comes back.
//! None of them return errors for expected failures: quota exhaustion,
//! unparsable replies and low-confidence patterns all map to fallback values.
//!
//! | adapter | cached | on failure |
//! |---|---|---|
//! | [`reply`](CarbonAssistant::reply) | yes | [`ChatReply::QuotaExceeded`] / [`ChatReply::Failed`] |
//! | [`suggestions`](CarbonAssistant::suggestions) | yes | fixed four-item list |
//! | [`detect_pattern`](CarbonAssistant::detect_pattern) | yes | `None` |
//! | [`extract_bill_units`](CarbonAssistant::extract_bill_units) | no | user-facing message |

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::Result;
use crate::activity::ActivityRecord;
use crate::cache::{CachedResponse, fingerprint};
use crate::gateway::Gateway;
use crate::gemini::{Content, GenerateRequest, GenerationConfig, Part};
use crate::sanitize::{HistoryLimits, clamp_text, sanitize_with};
use crate::telemetry;
use crate::types::{BillExtraction, ChatReply, HistoryTurn, PatternInsight, Role};

/// Reply used when the service answers without any text.
pub const NO_RESPONSE_TEXT: &str = "No response from Gemini";

/// Suggestions served while the service quota is exhausted.
pub const QUOTA_FALLBACK_SUGGESTIONS: [&str; 4] = [
    "Use public transport or carpool to reduce travel emissions",
    "Opt for plant-based meals a few times a week",
    "Improve home insulation and use energy-efficient appliances",
    "Minimize single-use plastics and recycle more effectively",
];

/// Suggestions served when the reply could not be parsed.
pub const DEFAULT_SUGGESTIONS: [&str; 4] = [
    "Use public transport more often",
    "Reduce non-vegetarian meals",
    "Lower electricity usage",
    "Recycle household waste",
];

/// Number of suggestions requested and returned.
pub const SUGGESTION_COUNT: usize = 4;

/// Patterns below this confidence are discarded.
pub const PATTERN_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Fewer activities than this are not worth analysing.
pub const MIN_PATTERN_ACTIVITIES: usize = 5;

/// Activities described in the pattern prompt.
const PATTERN_PROMPT_ACTIVITIES: usize = 10;

/// Activity ids that make up the pattern cache key.
const PATTERN_KEY_ACTIVITIES: usize = 5;

/// History text kept per turn in the chat cache key.
const CHAT_KEY_CHARS: usize = 120;

/// Shown when the bill call fails for any reason.
pub const BILL_ERROR_MESSAGE: &str = "Could not process bill image. Please enter units manually.";

const BILL_PROMPT: &str = "You are an electricity bill parser for Indian electricity boards.
Find the total electricity CONSUMPTION in Units (kWh).
Return ONLY a plain integer number. If not found, return 0.";

const BILL_MAX_OUTPUT_TOKENS: u32 = 20;

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"));

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").expect("valid number regex"));

/// The adapters, sharing one [`Gateway`].
#[derive(Clone)]
pub struct CarbonAssistant {
    gateway: Arc<Gateway>,
    limits: HistoryLimits,
}

impl CarbonAssistant {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            limits: HistoryLimits::default(),
        }
    }

    /// Override the history bounds used by [`reply`](Self::reply).
    pub fn with_history_limits(mut self, limits: HistoryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Answer `message` in the context of `history`.
    pub async fn reply(&self, user_id: &str, message: &str, history: &[HistoryTurn]) -> ChatReply {
        match self.try_reply(user_id, message, history).await {
            Ok(text) => ChatReply::Text(text),
            Err(e) if e.is_quota() => {
                warn!(user_id, error = %e, "chat unavailable: quota");
                ChatReply::QuotaExceeded
            }
            Err(e) => {
                error!(user_id, error = %e, "chat failed");
                ChatReply::Failed(e.to_string())
            }
        }
    }

    async fn try_reply(
        &self,
        user_id: &str,
        message: &str,
        history: &[HistoryTurn],
    ) -> Result<String> {
        let history = sanitize_with(history, self.limits);
        let trimmed: Vec<_> = history
            .iter()
            .map(|turn| {
                let text = turn.parts.first().and_then(Part::as_text).unwrap_or_default();
                json!({"r": turn.role, "t": clamp_text(text, CHAT_KEY_CHARS)})
            })
            .collect();
        let key = fingerprint("chat", user_id, &json!({"msg": message, "h": trimmed}));

        if let Some(CachedResponse::Reply(text)) = self.gateway.cache().get(&key).await {
            return Ok(text);
        }

        let mut contents = history;
        contents.push(Content::text(
            Role::User,
            clamp_text(message, self.limits.max_chars),
        ));
        let response = self
            .gateway
            .generate(&GenerateRequest::new(contents))
            .await?;

        match response.first_text() {
            Some(text) => {
                let text = text.to_string();
                self.gateway
                    .cache()
                    .insert(key, CachedResponse::Reply(text.clone()))
                    .await;
                Ok(text)
            }
            None => {
                debug!(user_id, "reply carried no text");
                Ok(NO_RESPONSE_TEXT.to_string())
            }
        }
    }

    /// Four short suggestions for cutting this week's emissions.
    ///
    /// Never fails: quota exhaustion yields [`QUOTA_FALLBACK_SUGGESTIONS`],
    /// any other failure or an unparsable reply yields [`DEFAULT_SUGGESTIONS`].
    pub async fn suggestions(
        &self,
        user_id: &str,
        weekly_total: f64,
        breakdown: &BTreeMap<String, f64>,
    ) -> Vec<String> {
        let key = fingerprint(
            "suggestions",
            user_id,
            &json!({"weeklyEmissionsKg": weekly_total, "categoryBreakdown": breakdown}),
        );
        if let Some(CachedResponse::Suggestions(list)) = self.gateway.cache().get(&key).await {
            return list;
        }

        let prompt = format!(
            "Give exactly {SUGGESTION_COUNT} short actionable suggestions to reduce carbon footprint.
Weekly emissions: {weekly_total} kg CO2
Breakdown: {}
Return ONLY a JSON array of {SUGGESTION_COUNT} strings.",
            json!(breakdown)
        );

        let fallback = match self.reply(user_id, &prompt, &[]).await {
            ChatReply::Text(text) => match parse_suggestions(&text) {
                Some(list) => {
                    self.gateway
                        .cache()
                        .insert(key, CachedResponse::Suggestions(list.clone()))
                        .await;
                    return list;
                }
                None => {
                    debug!(user_id, "suggestions reply did not parse");
                    DEFAULT_SUGGESTIONS
                }
            },
            ChatReply::QuotaExceeded => QUOTA_FALLBACK_SUGGESTIONS,
            ChatReply::Failed(_) => DEFAULT_SUGGESTIONS,
        };

        count_fallback("suggestions");
        fallback.iter().map(|s| s.to_string()).collect()
    }

    /// Look for a strong pattern in a user's recent activities (newest first).
    ///
    /// Returns `None` without calling the service when there are fewer than
    /// [`MIN_PATTERN_ACTIVITIES`] activities, and `None` when the reply is not
    /// a pattern object or its confidence is under
    /// [`PATTERN_CONFIDENCE_THRESHOLD`].
    pub async fn detect_pattern(
        &self,
        user_id: &str,
        activities: &[ActivityRecord],
    ) -> Option<PatternInsight> {
        if activities.len() < MIN_PATTERN_ACTIVITIES {
            return None;
        }

        let ids: Vec<&str> = activities
            .iter()
            .take(PATTERN_KEY_ACTIVITIES)
            .map(|a| a.id.as_str())
            .collect();
        let key = fingerprint("pattern", user_id, &json!(ids));
        if let Some(CachedResponse::Pattern(insight)) = self.gateway.cache().get(&key).await {
            return Some(insight);
        }

        let recent: Vec<_> = activities
            .iter()
            .take(PATTERN_PROMPT_ACTIVITIES)
            .map(|a| json!({"date": a.created_at, "category": a.category, "details": a.details}))
            .collect();
        let prompt = format!(
            "Analyze user activity history and detect a strong pattern.
Return ONLY JSON or null.
Example JSON: {{\"pattern\":\"high travel on weekends\",\"suggestion\":\"Try carpooling\",\"confidence\":0.8}}
History:
{}",
            json!(recent)
        );

        let text = match self.reply(user_id, &prompt, &[]).await {
            ChatReply::Text(text) => text,
            ChatReply::QuotaExceeded | ChatReply::Failed(_) => {
                count_fallback("pattern");
                return None;
            }
        };

        let Some(insight) = parse_pattern(&text) else {
            debug!(user_id, "no pattern in reply");
            count_fallback("pattern");
            return None;
        };
        if insight.confidence < PATTERN_CONFIDENCE_THRESHOLD {
            debug!(
                user_id,
                confidence = insight.confidence,
                "pattern below confidence threshold"
            );
            count_fallback("pattern");
            return None;
        }

        self.gateway
            .cache()
            .insert(key, CachedResponse::Pattern(insight.clone()))
            .await;
        Some(insight)
    }

    /// Read the consumption units off a bill photo.
    ///
    /// The first number in the reply wins; a reply with no number reads as
    /// 0 units. Failures of the call itself yield [`BILL_ERROR_MESSAGE`].
    pub async fn extract_bill_units(&self, image: &[u8], mime_type: &str) -> BillExtraction {
        let request = GenerateRequest::new(vec![Content {
            role: Role::User,
            parts: vec![Part::inline(mime_type, image), Part::text(BILL_PROMPT)],
        }])
        .with_config(GenerationConfig {
            temperature: Some(0.0),
            max_output_tokens: Some(BILL_MAX_OUTPUT_TOKENS),
        });

        match self.gateway.generate(&request).await {
            Ok(response) => {
                let raw = response.first_text().map(str::trim).unwrap_or("0");
                debug!(raw, "bill extraction reply");
                BillExtraction::Units(first_number(raw))
            }
            Err(e) => {
                error!(error = %e, "bill extraction failed");
                count_fallback("bill");
                BillExtraction::Failed(BILL_ERROR_MESSAGE.to_string())
            }
        }
    }
}

fn count_fallback(operation: &'static str) {
    metrics::counter!(telemetry::FALLBACKS_TOTAL, "operation" => operation).increment(1);
}

/// First bracketed JSON array of at least four strings; the first four are kept.
pub fn parse_suggestions(text: &str) -> Option<Vec<String>> {
    let array = JSON_ARRAY.find(text)?;
    let list: Vec<String> = serde_json::from_str(array.as_str()).ok()?;
    (list.len() >= SUGGESTION_COUNT).then(|| list.into_iter().take(SUGGESTION_COUNT).collect())
}

/// Parse a pattern object, tolerating Markdown code fences. `null` is `None`.
pub fn parse_pattern(text: &str) -> Option<PatternInsight> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str::<Option<PatternInsight>>(&cleaned)
        .ok()
        .flatten()
}

/// Remove ```` ```json ```` / ```` ``` ```` markers and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("```") {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 3..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// First decimal number in `text`, or 0.
pub fn first_number(text: &str) -> f64 {
    FIRST_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}
