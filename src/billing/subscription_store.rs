//! Where the subscription mirror is read from.
//!
//! Stripe webhooks keep a `subscriptions` table in sync; the dashboard reads
//! the user's current row when it resolves a session.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

use super::subscription::Subscription;
use crate::error::{DashboardError, Result};
use crate::usage::camelize;
use crate::utils::{DataApiConfig, DataApiTable};

const TABLE: &str = "subscriptions";

/// Statuses that count as a current subscription in the mirror.
const CURRENT_STATUSES: &str = "in.(trialing,active)";

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The user's current subscription, if any.
    async fn current_subscription(&self, user_id: &str) -> Result<Option<Subscription>>;
}

/// Subscription mirror over the PostgREST data API.
#[derive(Clone, Debug)]
pub struct RestSubscriptionStore {
    table: DataApiTable,
}

impl RestSubscriptionStore {
    /// # Errors
    ///
    /// Returns `BadRequest` if the base URL cannot be parsed.
    pub fn new(config: DataApiConfig) -> Result<Self> {
        Ok(Self {
            table: DataApiTable::new(config, TABLE)?,
        })
    }

    fn query_url(&self, user_id: &str) -> Url {
        let mut url = self.table.url();
        url.query_pairs_mut()
            .append_pair("select", "status,price_id")
            .append_pair("user_id", &format!("eq.{}", user_id))
            .append_pair("status", CURRENT_STATUSES)
            .append_pair("order", "created.desc")
            .append_pair("limit", "1");
        url
    }
}

fn decode_current(rows: Value) -> Result<Option<Subscription>> {
    let rows: Vec<Subscription> = serde_json::from_value(camelize(rows))
        .map_err(|e| DashboardError::internal(format!("Invalid subscriptions row: {}", e)))?;
    Ok(rows.into_iter().next())
}

#[async_trait]
impl SubscriptionStore for RestSubscriptionStore {
    async fn current_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        let rows = self.table.fetch_rows(self.query_url(user_id)).await?;
        decode_current(rows)
    }
}

/// In-memory mirror for development and tests.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, user_id: &str, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(user_id.to_string(), subscription);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn current_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.read().await.get(user_id).cloned())
    }
}
