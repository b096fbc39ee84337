//! Use cases a route layer calls: activities, insights, bills, rewards.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::activity::{
    ActivityCategory, ActivityRecord, ActivityStore, CARBON_PER_KWH, NewActivity,
    carbon_emission, round2,
};
use crate::assistant::CarbonAssistant;
use crate::rewards::{
    REWARD_TIERS, RewardTier, WeeklySummary, category_breakdown, summarize_week, total_emissions,
    week_start,
};
use crate::types::{BillExtraction, ChatReply, HistoryTurn, PatternInsight};
use crate::{FootprintError, Result};

/// Look-back window for pattern detection.
pub const PATTERN_WINDOW_DAYS: i64 = 30;

/// `details.source` of activities created from a bill photo.
pub const BILL_UPLOAD_SOURCE: &str = "bill_upload";

pub const TIPS: [&str; 4] = [
    "Use public transport to reduce emissions",
    "Prefer vegetarian meals more often",
    "Reduce electricity consumption during peak hours",
    "Recycle waste properly",
];

const NO_UNITS_MESSAGE: &str =
    "Could not find electricity units on the bill. Please enter manually in Add Activity.";

const BILL_ALREADY_UPLOADED: &str =
    "You have already uploaded a bill this month. You can add another next month.";

/// Suggestions for the current week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySuggestions {
    /// Rounded to two decimals.
    pub weekly_emissions_kg: f64,
    pub suggestions: Vec<String>,
}

/// Result of a bill upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillUpload {
    pub units: f64,
    pub carbon_emission: f64,
    pub activity: ActivityRecord,
}

/// The carbon-tracking use cases, over a store and the assistant.
#[derive(Clone)]
pub struct CarbonService {
    store: Arc<dyn ActivityStore>,
    assistant: CarbonAssistant,
}

impl CarbonService {
    pub fn new(store: Arc<dyn ActivityStore>, assistant: CarbonAssistant) -> Self {
        Self { store, assistant }
    }

    pub fn assistant(&self) -> &CarbonAssistant {
        &self.assistant
    }

    pub fn store(&self) -> &Arc<dyn ActivityStore> {
        &self.store
    }

    /// Compute the emission of an activity and store it.
    pub async fn add_activity(
        &self,
        user_id: &str,
        category: ActivityCategory,
        details: Value,
        now: DateTime<Utc>,
    ) -> Result<ActivityRecord> {
        let emission = carbon_emission(category, &details)?;
        let record = self
            .store
            .insert(NewActivity {
                user_id: user_id.to_string(),
                category,
                details,
                carbon_emission: emission,
                created_at: now,
            })
            .await?;
        debug!(user_id, %category, emission, "activity added");
        Ok(record)
    }

    /// A user's activities, newest first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<ActivityRecord>> {
        self.store.history(user_id).await
    }

    /// Conversational reply. Quota exhaustion is an error here so the route
    /// layer answers 503.
    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        history: &[HistoryTurn],
    ) -> Result<String> {
        if message.trim().is_empty() {
            return Err(FootprintError::InvalidInput(
                "Message is required".to_string(),
            ));
        }
        match self.assistant.reply(user_id, message.trim(), history).await {
            ChatReply::Text(text) => Ok(text),
            ChatReply::QuotaExceeded => Err(FootprintError::QuotaExceeded(
                "AI service temporarily unavailable".to_string(),
            )),
            ChatReply::Failed(reason) => Err(FootprintError::Api {
                status: 503,
                message: reason,
            }),
        }
    }

    /// Suggestions based on the week containing `now`.
    pub async fn suggestions_for(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WeeklySuggestions> {
        let activities = self.store.find_since(user_id, week_start(now)).await?;
        let total = total_emissions(&activities);
        let breakdown = category_breakdown(&activities);
        let suggestions = self.assistant.suggestions(user_id, total, &breakdown).await;
        Ok(WeeklySuggestions {
            weekly_emissions_kg: round2(total),
            suggestions,
        })
    }

    /// Pattern over the last 30 days, if a confident one exists.
    pub async fn pattern_for(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PatternInsight>> {
        let since = now - Duration::days(PATTERN_WINDOW_DAYS);
        let activities = self.store.find_since(user_id, since).await?;
        Ok(self.assistant.detect_pattern(user_id, &activities).await)
    }

    /// Read an electricity bill photo and log its consumption.
    ///
    /// One bill upload per calendar month.
    pub async fn upload_bill(
        &self,
        user_id: &str,
        image: &[u8],
        mime_type: &str,
        now: DateTime<Utc>,
    ) -> Result<BillUpload> {
        if image.is_empty() {
            return Err(FootprintError::InvalidInput(
                "No bill image uploaded".to_string(),
            ));
        }

        let units = match self.assistant.extract_bill_units(image, mime_type).await {
            BillExtraction::Units(units) => units,
            BillExtraction::Failed(message) => return Err(FootprintError::InvalidInput(message)),
        };
        if units <= 0.0 {
            return Err(FootprintError::InvalidInput(NO_UNITS_MESSAGE.to_string()));
        }

        let this_month = self.store.find_since(user_id, month_start(now)).await?;
        if this_month.iter().any(is_bill_upload) {
            return Err(FootprintError::Conflict(BILL_ALREADY_UPLOADED.to_string()));
        }

        let emission = round2(units * CARBON_PER_KWH);
        let activity = self
            .store
            .insert(NewActivity {
                user_id: user_id.to_string(),
                category: ActivityCategory::Electricity,
                details: json!({"units": units, "source": BILL_UPLOAD_SOURCE}),
                carbon_emission: emission,
                created_at: now,
            })
            .await?;
        info!(user_id, units, emission, "bill uploaded");

        Ok(BillUpload {
            units,
            carbon_emission: emission,
            activity,
        })
    }

    /// This week's totals and the reward they earn.
    pub async fn weekly_reward(&self, user_id: &str, now: DateTime<Utc>) -> Result<WeeklySummary> {
        let start = week_start(now);
        let activities = self.store.find_since(user_id, start).await?;
        Ok(summarize_week(start, &activities))
    }

    pub fn reward_tiers(&self) -> &'static [RewardTier] {
        &REWARD_TIERS
    }

    pub fn tips(&self) -> &'static [&'static str] {
        &TIPS
    }
}

fn is_bill_upload(record: &ActivityRecord) -> bool {
    record.category == ActivityCategory::Electricity
        && record.details.get("source").and_then(Value::as_str) == Some(BILL_UPLOAD_SOURCE)
}

/// First day of the month containing `now`, 00:00 UTC.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .unwrap_or_else(|| now.date_naive())
        .and_time(NaiveTime::MIN)
        .and_utc()
}
