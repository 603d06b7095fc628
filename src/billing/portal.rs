//! Stripe Customer Portal link.
//!
//! Subscribers manage their plan on the Stripe-hosted portal. The dashboard
//! links to a single configured portal URL and only shows it to users with
//! an active subscription.

use serde::{Deserialize, Serialize};
use url::Url;

use super::payment::Navigation;
use super::subscription::Subscription;
use crate::error::{DashboardError, Result};

/// Configuration for the customer portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Hosted portal login link (e.g. `https://billing.stripe.com/p/login/...`).
    /// No link is shown when unset.
    #[serde(default)]
    pub url: Option<String>,
}

impl PortalConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Resolves the portal link shown on the dashboard.
#[derive(Debug, Clone, Default)]
pub struct PortalLink {
    url: Option<String>,
}

impl PortalLink {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if the configured URL is not an absolute HTTPS URL.
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let Some(url) = config.url.as_deref() else {
            return Ok(Self::default());
        };

        let parsed = Url::parse(url)
            .map_err(|e| DashboardError::bad_request(format!("Invalid portal URL: {}", e)))?;
        if parsed.scheme() != "https" {
            return Err(DashboardError::bad_request("Portal URL must use HTTPS"));
        }

        Ok(Self {
            url: Some(url.to_string()),
        })
    }

    /// Portal navigation for `subscription`, when one should be offered.
    #[must_use]
    pub fn for_subscription(&self, subscription: Option<&Subscription>) -> Option<Navigation> {
        let url = self.url.as_ref()?;
        subscription
            .filter(|s| s.is_active())
            .map(|_| Navigation::External(url.clone()))
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::SubscriptionStatus;

    const PORTAL: &str = "https://billing.stripe.com/p/login/test_123";

    #[test]
    fn test_link_only_for_active_subscription() {
        let link = PortalLink::from_config(&PortalConfig::new().url(PORTAL)).unwrap();

        let active = Subscription::new(SubscriptionStatus::Active, Some("price_123"));
        let past_due = Subscription::new(SubscriptionStatus::PastDue, Some("price_123"));

        assert_eq!(
            link.for_subscription(Some(&active)),
            Some(Navigation::External(PORTAL.to_string()))
        );
        assert_eq!(link.for_subscription(Some(&past_due)), None);
        assert_eq!(link.for_subscription(None), None);
    }

    #[test]
    fn test_unconfigured_link_is_hidden() {
        let link = PortalLink::from_config(&PortalConfig::default()).unwrap();
        let active = Subscription::new(SubscriptionStatus::Active, None);

        assert!(!link.is_configured());
        assert_eq!(link.for_subscription(Some(&active)), None);
    }

    #[test]
    fn test_rejects_plain_http() {
        let config = PortalConfig::new().url("http://billing.example.com/portal");
        assert!(PortalLink::from_config(&config).is_err());
    }
}
