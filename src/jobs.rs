//! Domain logic of the two daily jobs. Scheduling is left to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::Result;
use crate::activity::{ActivityCategory, ActivityStore, CARBON_PER_WASTE_KG, NewActivity};

/// Waste logged for users who did not log any themselves.
pub const DEFAULT_WASTE_KG: f64 = 0.8;

/// Link placed in reminders when none is configured.
pub const DEFAULT_REMINDER_LINK: &str = "http://localhost:3000/add-activity";

/// Delivers a reminder to one user.
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn notify(&self, user_id: &str, link: &str) -> Result<()>;
}

/// `[00:00, 24:00)` of the UTC day containing `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Give every user without a Waste activity today the default amount.
///
/// Returns the users that were filled in.
pub async fn auto_fill_waste(store: &dyn ActivityStore, now: DateTime<Utc>) -> Result<Vec<String>> {
    let (start, end) = day_bounds(now);
    let mut filled = Vec::new();

    for user_id in store.users().await? {
        let today = store.find_between(&user_id, start, end).await?;
        if today.iter().any(|a| a.category == ActivityCategory::Waste) {
            continue;
        }
        store
            .insert(NewActivity {
                user_id: user_id.clone(),
                category: ActivityCategory::Waste,
                details: json!({"weightKg": DEFAULT_WASTE_KG, "auto": true}),
                carbon_emission: DEFAULT_WASTE_KG * CARBON_PER_WASTE_KG,
                created_at: now,
            })
            .await?;
        filled.push(user_id);
    }

    info!(count = filled.len(), "auto waste filled");
    Ok(filled)
}

/// Remind every user with no activity today. Returns the number reminded.
///
/// A failed delivery is logged and skipped.
pub async fn send_daily_reminders(
    store: &dyn ActivityStore,
    notifier: &dyn ReminderNotifier,
    link: &str,
    now: DateTime<Utc>,
) -> Result<usize> {
    let (start, end) = day_bounds(now);
    let mut sent = 0;

    for user_id in store.users().await? {
        if !store.find_between(&user_id, start, end).await?.is_empty() {
            continue;
        }
        match notifier.notify(&user_id, link).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(user_id, error = %e, "reminder failed"),
        }
    }

    info!(sent, "daily reminders sent");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bounds_cover_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 20, 0, 0).unwrap();
        let (start, end) = day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap());
    }
}
