//! Weekly emission totals and the reward they earn.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::activity::{ActivityRecord, round2};

/// A reward band: weeks at or under `max_emissions` kg earn it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTier {
    pub name: &'static str,
    pub max_emissions: f64,
    pub points: u32,
    pub badge: &'static str,
}

/// Tiers from best to worst; the first that fits wins.
pub const REWARD_TIERS: [RewardTier; 4] = [
    RewardTier {
        name: "Eco Champion",
        max_emissions: 20.0,
        points: 100,
        badge: "gold",
    },
    RewardTier {
        name: "Green Star",
        max_emissions: 50.0,
        points: 75,
        badge: "silver",
    },
    RewardTier {
        name: "Eco Friend",
        max_emissions: 100.0,
        points: 50,
        badge: "bronze",
    },
    RewardTier {
        name: "On Track",
        max_emissions: 200.0,
        points: 25,
        badge: "green",
    },
];

/// The reward a week earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub tier: String,
    pub points: u32,
    pub badge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_emissions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Pick the reward for a weekly total.
pub fn reward_for(total_emissions: f64) -> Reward {
    match REWARD_TIERS
        .iter()
        .find(|t| total_emissions <= t.max_emissions)
    {
        Some(tier) => Reward {
            tier: tier.name.to_string(),
            points: tier.points,
            badge: tier.badge.to_string(),
            max_emissions: Some(tier.max_emissions),
            message: None,
        },
        None => Reward {
            tier: "Keep Trying".to_string(),
            points: 0,
            badge: "none".to_string(),
            max_emissions: None,
            message: Some("Reduce emissions this week to earn a reward next week.".to_string()),
        },
    }
}

/// Monday 00:00 of the week containing `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = i64::from(now.weekday().num_days_from_monday());
    let monday = now.date_naive() - Duration::days(days_from_monday);
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// Sum of emissions per category name.
pub fn category_breakdown(activities: &[ActivityRecord]) -> BTreeMap<String, f64> {
    let mut breakdown = BTreeMap::new();
    for a in activities {
        *breakdown.entry(a.category.to_string()).or_insert(0.0) += a.carbon_emission;
    }
    breakdown
}

/// Total emissions of the given activities.
pub fn total_emissions(activities: &[ActivityRecord]) -> f64 {
    activities.iter().map(|a| a.carbon_emission).sum()
}

/// One week of activity, summarised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub week_start: DateTime<Utc>,
    /// Rounded to two decimals.
    pub total_emissions: f64,
    pub activity_count: usize,
    pub category_breakdown: BTreeMap<String, f64>,
    pub reward: Reward,
}

/// Summarise `activities` (already limited to the week) for `week_start`.
pub fn summarize_week(week_start: DateTime<Utc>, activities: &[ActivityRecord]) -> WeeklySummary {
    let total = total_emissions(activities);
    WeeklySummary {
        week_start,
        total_emissions: round2(total),
        activity_count: activities.len(),
        category_breakdown: category_breakdown(activities),
        reward: reward_for(total),
    }
}
