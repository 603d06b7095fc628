//! Read access to one table of a PostgREST data API (e.g. Supabase `/rest/v1`).

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::{DashboardError, Result};

/// Connection settings for the data API.
#[derive(Debug, Clone)]
pub struct DataApiConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service or anon key, sent as `apikey` and bearer token.
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl DataApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for `{base_url}/rest/v1/{table}`.
#[derive(Clone)]
pub struct DataApiTable {
    table: &'static str,
    endpoint: Url,
    api_key: SecretString,
    client: reqwest::Client,
}

impl DataApiTable {
    /// # Errors
    ///
    /// Returns `BadRequest` if the base URL cannot be parsed.
    pub fn new(config: DataApiConfig, table: &'static str) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| DashboardError::bad_request(format!("Invalid data API URL: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| DashboardError::bad_request(format!("Invalid data API URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Ok(Self {
            table,
            endpoint,
            api_key: config.api_key,
            client,
        })
    }

    /// Table URL without a query; callers append PostgREST filters.
    #[must_use]
    pub fn url(&self) -> Url {
        self.endpoint.clone()
    }

    /// GET `url` and return its rows as a JSON array.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` for a non-success status, `Internal` when the body
    /// is not an array of rows.
    pub async fn fetch_rows(&self, url: Url) -> Result<Value> {
        let key = self.api_key.expose_secret();
        let response = self
            .client
            .get(url)
            .header("apikey", key)
            .bearer_auth(key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: "dashboard_billing::data_api",
                table = self.table,
                status = status.as_u16(),
                detail = %detail,
                "Data API rejected query"
            );
            return Err(DashboardError::service_unavailable(format!(
                "Data API returned status {}",
                status
            )));
        }

        let body: Value = response.json().await?;
        ensure_rows(self.table, body)
    }
}

impl std::fmt::Debug for DataApiTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataApiTable")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// PostgREST answers errors with an object; rows always come as an array.
pub(crate) fn ensure_rows(table: &str, body: Value) -> Result<Value> {
    if body.is_array() {
        Ok(body)
    } else {
        Err(DashboardError::internal(format!(
            "Data API returned a non-array body for {}",
            table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(base: &str) -> DataApiTable {
        DataApiTable::new(DataApiConfig::new(base, "service-key".to_string()), "plan_usages")
            .unwrap()
    }

    #[test]
    fn test_table_url() {
        assert_eq!(
            table("https://xyz.supabase.co").url().as_str(),
            "https://xyz.supabase.co/rest/v1/plan_usages"
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let url = table("http://localhost:54321/project").url();
        assert_eq!(url.path(), "/project/rest/v1/plan_usages");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = DataApiTable::new(
            DataApiConfig::new("not a url", "k".to_string()),
            "plan_usages",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_error_object_is_rejected() {
        let err = ensure_rows("subscriptions", json!({ "message": "permission denied" }))
            .unwrap_err();
        assert!(matches!(err, DashboardError::Internal(_)));
        assert!(ensure_rows("subscriptions", json!([])).is_ok());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", table("https://xyz.supabase.co"));
        assert!(!debug.contains("service-key"));
    }
}
