//! Plan usage for the dashboard.
//!
//! [`UsageReader`] checks the session first and only then queries the
//! [`UsageStore`]. Store failures are logged and rendered as "no usage" so
//! the page always loads.
//!
//! ```rust,ignore
//! let reader = UsageReader::new(Arc::new(store)).window_days(Some(30));
//!
//! match reader.load_dashboard_data(session.as_ref()).await {
//!     PageLoad::Redirect { destination, .. } => redirect(destination),
//!     PageLoad::Data(data) => render(data.usage),
//! }
//! ```

mod in_memory;
#[cfg(feature = "database")]
pub mod sea_orm_store;
pub mod rest_store;

pub use in_memory::InMemoryUsageStore;
pub use rest_store::RestUsageStore;
#[cfg(feature = "database")]
pub use sea_orm_store::SeaOrmUsageStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::session::{Session, SessionUser};

/// Metered usage for one user and billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: i64,
    pub user_id: String,
    #[serde(deserialize_with = "deserialize_period_start")]
    pub period_start: DateTime<Utc>,
    pub usage: i64,
}

/// Accepts RFC 3339 timestamps and zone-less timestamps (read as UTC).
fn deserialize_period_start<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Read access to persisted usage records.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Records for `user_id`, oldest period first. `since` drops records
    /// whose period started earlier.
    async fn list_usage(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageRecord>>;
}

/// Outcome of loading a protected page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PageLoad<T> {
    /// Not signed in: send the browser elsewhere.
    Redirect { destination: String, permanent: bool },
    /// Page data for the signed-in user.
    Data(T),
}

impl<T> PageLoad<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PageLoad<U> {
        match self {
            Self::Redirect {
                destination,
                permanent,
            } => PageLoad::Redirect {
                destination,
                permanent,
            },
            Self::Data(data) => PageLoad::Data(f(data)),
        }
    }
}

/// Data loaded for the pricing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub user: SessionUser,
    pub usage: Vec<UsageRecord>,
}

/// Loads the signed-in user's usage for the dashboard.
#[derive(Clone)]
pub struct UsageReader {
    store: Arc<dyn UsageStore>,
    window: Option<chrono::Duration>,
    login_path: String,
}

impl UsageReader {
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            window: None,
            login_path: "/login".to_string(),
        }
    }

    /// Only show periods that started in the last `days` days.
    #[must_use]
    pub fn window_days(mut self, days: Option<u32>) -> Self {
        self.window = days.map(|d| chrono::Duration::days(i64::from(d)));
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Load page data, or a login redirect when there is no session.
    ///
    /// Never fails: a store error is logged and yields empty usage.
    pub async fn load_dashboard_data(&self, session: Option<&Session>) -> PageLoad<DashboardData> {
        let Some(session) = session else {
            return PageLoad::Redirect {
                destination: self.login_path.clone(),
                permanent: false,
            };
        };

        let since = self.window.map(|window| Utc::now() - window);
        let usage = match self.store.list_usage(&session.user.id, since).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    target: "dashboard_billing::usage",
                    user_id = %session.user.id,
                    error = %e,
                    "Failed to load plan usage"
                );
                Vec::new()
            }
        };

        tracing::debug!(
            target: "dashboard_billing::usage",
            user_id = %session.user.id,
            records = usage.len(),
            "Loaded plan usage"
        );

        PageLoad::Data(DashboardData {
            user: session.user.clone(),
            usage,
        })
    }
}

/// Rewrite every object key from snake_case to camelCase, recursively.
///
/// Values are left untouched. Leading underscores are kept.
#[must_use]
pub fn camelize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (camelize_key(&key), camelize(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camelize).collect()),
        other => other,
    }
}

fn camelize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;

    for c in key.chars() {
        if c == '_' {
            if out.chars().all(|c| c == '_') {
                out.push('_');
            } else {
                upper_next = true;
            }
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}
