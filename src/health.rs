use async_trait::async_trait;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppContext;
use crate::billing::TierCatalog;

/// Health check status
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> ComponentHealth;
}

/// Always healthy while the process serves requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicHealthCheck;

#[async_trait]
impl HealthCheck for BasicHealthCheck {
    fn name(&self) -> &str {
        "application"
    }

    async fn check(&self) -> ComponentHealth {
        ComponentHealth {
            name: self.name().to_string(),
            status: HealthStatus::Healthy,
            message: Some("Application is running".to_string()),
        }
    }
}

/// Degraded when no tier can actually be bought, e.g. an unset Pro price id.
pub struct CatalogHealthCheck {
    catalog: Arc<TierCatalog>,
}

impl CatalogHealthCheck {
    pub fn new(catalog: Arc<TierCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl HealthCheck for CatalogHealthCheck {
    fn name(&self) -> &str {
        "tier_catalog"
    }

    async fn check(&self) -> ComponentHealth {
        let purchasable = self
            .catalog
            .iter()
            .filter(|t| t.is_purchasable())
            .filter(|t| t.price_id.as_deref().is_some_and(|p| !p.trim().is_empty()))
            .count();

        let (status, message) = if purchasable == 0 {
            (
                HealthStatus::Degraded,
                "No tier has a checkout price configured".to_string(),
            )
        } else {
            (
                HealthStatus::Healthy,
                format!("{} tiers, {} purchasable", self.catalog.len(), purchasable),
            )
        };

        ComponentHealth {
            name: self.name().to_string(),
            status,
            message: Some(message),
        }
    }
}

/// Runs every registered check; the worst status wins.
pub struct HealthChecker {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            checks: vec![Arc::new(BasicHealthCheck)],
        }
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub async fn check_health(&self) -> HealthResponse {
        let mut checks = Vec::with_capacity(self.checks.len());
        let mut overall_status = HealthStatus::Healthy;

        for check in &self.checks {
            let result = check.check().await;

            match result.status {
                HealthStatus::Unhealthy => overall_status = HealthStatus::Unhealthy,
                HealthStatus::Degraded if overall_status == HealthStatus::Healthy => {
                    overall_status = HealthStatus::Degraded
                }
                _ => {}
            }

            checks.push(result);
        }

        HealthResponse {
            status: overall_status,
            checks,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for `GET /health`
pub async fn health_handler(State(ctx): State<AppContext>) -> HealthResponse {
    ctx.health.check_health().await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCheck;

    #[async_trait]
    impl HealthCheck for FailingCheck {
        fn name(&self) -> &str {
            "failing"
        }

        async fn check(&self) -> ComponentHealth {
            ComponentHealth {
                name: "failing".to_string(),
                status: HealthStatus::Unhealthy,
                message: None,
            }
        }
    }

    #[tokio::test]
    async fn test_catalog_check_healthy() {
        let catalog = Arc::new(TierCatalog::standard("price_123", "https://example.com/sales"));
        let response = HealthChecker::new()
            .with_check(Arc::new(CatalogHealthCheck::new(catalog)))
            .check_health()
            .await;

        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_check_degraded_without_price() {
        let catalog = Arc::new(TierCatalog::standard("", "https://example.com/sales"));
        let response = HealthChecker::new()
            .with_check(Arc::new(CatalogHealthCheck::new(catalog)))
            .check_health()
            .await;

        assert_eq!(response.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_unhealthy_wins() {
        let response = HealthChecker::new()
            .with_check(Arc::new(FailingCheck))
            .check_health()
            .await;

        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert_eq!(
            response.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
