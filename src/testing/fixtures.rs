//! Test fixtures for usage data and signed-in users.

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};

use crate::usage::UsageRecord;

/// Builds `plan_usages` rows for one user, one per consecutive month.
#[derive(Debug, Clone)]
pub struct UsageFixture {
    user_id: String,
    first_period: DateTime<Utc>,
    next_id: i64,
}

impl UsageFixture {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            first_period: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            next_id: 1,
        }
    }

    /// First period starts at midnight UTC on the first of this month.
    pub fn starting(mut self, year: i32, month: u32) -> Self {
        if let Some(start) = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single() {
            self.first_period = start;
        }
        self
    }

    /// Start the months so the last one is the current month.
    pub fn ending_this_month(mut self, months: u32) -> Self {
        let now = Utc::now();
        let this_month = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        self.first_period = this_month
            .checked_sub_months(Months::new(months.saturating_sub(1)))
            .unwrap_or(this_month);
        self
    }

    pub fn first_id(mut self, id: i64) -> Self {
        self.next_id = id;
        self
    }

    /// One record per entry in `usage`, in month order.
    pub fn months(self, usage: &[i64]) -> Vec<UsageRecord> {
        usage
            .iter()
            .zip(0u32..)
            .map(|(&usage, offset)| UsageRecord {
                id: self.next_id + i64::from(offset),
                user_id: self.user_id.clone(),
                period_start: self
                    .first_period
                    .checked_add_months(Months::new(offset))
                    .unwrap_or(self.first_period),
                usage,
            })
            .collect()
    }
}
