//! Logged activities, their emission factors, and the store seam.
//!
//! Persistence lives outside this crate. [`ActivityStore`] is the interface
//! the service and the scheduled jobs consume; [`MemoryActivityStore`] backs
//! tests and the CLI.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FootprintError, Result};

/// kg CO2 per kWh of grid electricity.
pub const CARBON_PER_KWH: f64 = 0.82;

/// kg CO2 per kg of household waste.
pub const CARBON_PER_WASTE_KG: f64 = 0.5;

/// kg CO2 per meal.
pub const NONVEG_MEAL: f64 = 5.0;
pub const VEG_MEAL: f64 = 2.0;

/// Activity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityCategory {
    Travel,
    Food,
    Electricity,
    Waste,
}

impl ActivityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityCategory::Travel => "Travel",
            ActivityCategory::Food => "Food",
            ActivityCategory::Electricity => "Electricity",
            ActivityCategory::Waste => "Waste",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityCategory {
    type Err = FootprintError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Travel" => Ok(ActivityCategory::Travel),
            "Food" => Ok(ActivityCategory::Food),
            "Electricity" => Ok(ActivityCategory::Electricity),
            "Waste" => Ok(ActivityCategory::Waste),
            other => Err(FootprintError::InvalidInput(format!(
                "unknown category: {other}"
            ))),
        }
    }
}

/// kg CO2 per km for the supported vehicles.
fn vehicle_factor(vehicle: &str) -> Option<f64> {
    match vehicle {
        "car" => Some(0.21),
        "bike" => Some(0.07),
        "bus" => Some(0.05),
        _ => None,
    }
}

fn number(details: &Value, field: &str) -> Result<f64> {
    details
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| FootprintError::InvalidInput(format!("details.{field} must be a number")))
}

/// Emission in kg CO2 for one activity.
///
/// | category | details | emission |
/// |---|---|---|
/// | Travel | `vehicle`, `distanceKm` | factor(vehicle) × distance |
/// | Food | `type` | 5 for `nonveg`, else 2 |
/// | Electricity | `units` | units × 0.82 |
/// | Waste | `weightKg` | weight × 0.5 |
pub fn carbon_emission(category: ActivityCategory, details: &Value) -> Result<f64> {
    match category {
        ActivityCategory::Travel => {
            let vehicle = details
                .get("vehicle")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let factor = vehicle_factor(vehicle).ok_or_else(|| {
                FootprintError::InvalidInput(format!("unknown vehicle: {vehicle:?}"))
            })?;
            Ok(factor * number(details, "distanceKm")?)
        }
        ActivityCategory::Food => {
            let nonveg = details.get("type").and_then(Value::as_str) == Some("nonveg");
            Ok(if nonveg { NONVEG_MEAL } else { VEG_MEAL })
        }
        ActivityCategory::Electricity => Ok(number(details, "units")? * CARBON_PER_KWH),
        ActivityCategory::Waste => Ok(number(details, "weightKg")? * CARBON_PER_WASTE_KG),
    }
}

/// Round to two decimals, as totals are reported.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A stored activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub user_id: String,
    pub category: ActivityCategory,
    pub details: Value,
    pub carbon_emission: f64,
    pub created_at: DateTime<Utc>,
}

/// An activity not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: String,
    pub category: ActivityCategory,
    pub details: Value,
    pub carbon_emission: f64,
    pub created_at: DateTime<Utc>,
}

/// Persistence consumed by the service and the jobs.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Store an activity and return it with its assigned id.
    async fn insert(&self, activity: NewActivity) -> Result<ActivityRecord>;

    /// A user's activities created at or after `since`, newest first.
    async fn find_since(&self, user_id: &str, since: DateTime<Utc>)
    -> Result<Vec<ActivityRecord>>;

    /// A user's activities with `start <= created_at < end`, newest first.
    async fn find_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>>;

    /// A user's full history, newest first.
    async fn history(&self, user_id: &str) -> Result<Vec<ActivityRecord>>;

    /// Every known user id.
    async fn users(&self) -> Result<Vec<String>>;
}

/// In-memory [`ActivityStore`].
#[derive(Default)]
pub struct MemoryActivityStore {
    records: Mutex<Vec<ActivityRecord>>,
    users: Mutex<BTreeSet<String>>,
    next_id: AtomicU64,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user that has no activities yet.
    pub fn add_user(&self, user_id: impl Into<String>) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into());
    }

    fn select(&self, keep: impl Fn(&ActivityRecord) -> bool) -> Vec<ActivityRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = records.iter().filter(|r| keep(r)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn insert(&self, activity: NewActivity) -> Result<ActivityRecord> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = ActivityRecord {
            id: format!("act-{id}"),
            user_id: activity.user_id,
            category: activity.category,
            details: activity.details,
            carbon_emission: activity.carbon_emission,
            created_at: activity.created_at,
        };
        self.add_user(record.user_id.clone());
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(record)
    }

    async fn find_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        Ok(self.select(|r| r.user_id == user_id && r.created_at >= since))
    }

    async fn find_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        Ok(self.select(|r| r.user_id == user_id && r.created_at >= start && r.created_at < end))
    }

    async fn history(&self, user_id: &str) -> Result<Vec<ActivityRecord>> {
        Ok(self.select(|r| r.user_id == user_id))
    }

    async fn users(&self) -> Result<Vec<String>> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect())
    }
}
