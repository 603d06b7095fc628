use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{UsageRecord, UsageStore};
use crate::error::{DashboardError, Result};

/// In-memory usage store.
///
/// Used for local development and tests. Counts queries so callers can
/// assert that no lookup happened.
#[derive(Default)]
pub struct InMemoryUsageStore {
    records: RwLock<Vec<UsageRecord>>,
    failure: Option<String>,
    queries: AtomicUsize,
}

impl InMemoryUsageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_records(records: Vec<UsageRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Store whose every query fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub async fn insert(&self, record: UsageRecord) {
        self.records.write().await.push(record);
    }

    /// Number of `list_usage` calls served.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn list_usage(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(DashboardError::service_unavailable(message.clone()));
        }

        let mut records: Vec<UsageRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| since.is_none_or(|since| r.period_start >= since))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.period_start, r.id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, user_id: &str, day: u32) -> UsageRecord {
        UsageRecord {
            id,
            user_id: user_id.to_string(),
            period_start: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            usage: 1,
        }
    }

    #[tokio::test]
    async fn test_sorted_oldest_first() {
        let store = InMemoryUsageStore::new();
        store.insert(record(2, "u1", 10)).await;
        store.insert(record(1, "u1", 1)).await;

        let ids: Vec<i64> = store
            .list_usage("u1", None)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_since_is_inclusive() {
        let store = InMemoryUsageStore::with_records(vec![record(1, "u1", 1), record(2, "u1", 5)]);
        let since = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();

        let records = store.list_usage("u1", Some(since)).await.unwrap();
        assert_eq!(records, vec![record(2, "u1", 5)]);
    }

    #[tokio::test]
    async fn test_failing_store_counts_query() {
        let store = InMemoryUsageStore::failing("down");
        assert!(store.list_usage("u1", None).await.is_err());
        assert_eq!(store.query_count(), 1);
    }
}
