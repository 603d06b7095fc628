//! Usage store over a PostgREST data API (e.g. Supabase `/rest/v1`).
//!
//! Rows come back with snake_case column names and are passed through
//! [`camelize`](super::camelize) before decoding.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use url::Url;

use super::{UsageRecord, UsageStore, camelize};
use crate::error::{DashboardError, Result};
use crate::utils::{DataApiConfig, DataApiTable};

const TABLE: &str = "plan_usages";

/// PostgREST-backed usage store.
#[derive(Clone, Debug)]
pub struct RestUsageStore {
    table: DataApiTable,
}

impl RestUsageStore {
    /// Create a store for the `plan_usages` table.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if the base URL cannot be parsed.
    pub fn new(config: DataApiConfig) -> Result<Self> {
        Ok(Self {
            table: DataApiTable::new(config, TABLE)?,
        })
    }

    /// Request URL for one user's rows.
    fn query_url(&self, user_id: &str, since: Option<DateTime<Utc>>) -> Url {
        let mut url = self.table.url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            query.append_pair("user_id", &format!("eq.{}", user_id));
            if let Some(since) = since {
                query.append_pair(
                    "period_start",
                    &format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                );
            }
            query.append_pair("order", "period_start.asc");
        }
        url
    }
}

/// Decode PostgREST rows into usage records.
fn decode_rows(rows: Value) -> Result<Vec<UsageRecord>> {
    serde_json::from_value(camelize(rows))
        .map_err(|e| DashboardError::internal(format!("Invalid plan_usages row: {}", e)))
}

#[async_trait]
impl UsageStore for RestUsageStore {
    async fn list_usage(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageRecord>> {
        let rows = self.table.fetch_rows(self.query_url(user_id, since)).await?;
        decode_rows(rows)
    }
}
