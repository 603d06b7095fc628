//! Tier catalog and usage-limit resolution.
//!
//! The catalog is an ordered, immutable list of tiers built once at startup.
//! The first entry is conventionally the free tier.
//!
//! ```rust
//! use dashboard_billing::billing::{TierCatalog, resolve_limit};
//!
//! let catalog = TierCatalog::builder()
//!     .tier("free")
//!         .usage_limit(5)
//!         .display_name("Free")
//!         .done()
//!     .tier("pro")
//!         .stripe_price("price_123")
//!         .usage_limit(100)
//!         .display_name("Pro")
//!         .done()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(resolve_limit(Some("price_123"), &catalog), 100);
//! assert_eq!(resolve_limit(Some("price_999"), &catalog), 5);
//! assert_eq!(resolve_limit(None, &catalog), 5);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::subscription::Subscription;
use crate::error::{DashboardError, Result};

/// Usage limit applied when no tier matches and the catalog has no free tier.
pub const DEFAULT_USAGE_LIMIT: u64 = 5;

/// A named subscription level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    /// Catalog key (e.g. "free", "pro").
    pub id: String,
    /// Payment-processor price id. `None` for tiers that are never purchased.
    #[serde(default)]
    pub price_id: Option<String>,
    /// Metered usage allowed on this tier.
    pub usage_limit: u64,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Sales contact link for tiers sold outside self-serve checkout.
    #[serde(default)]
    pub contact_url: Option<String>,
}

impl Tier {
    /// Whether this tier can be bought through hosted checkout.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.price_id.is_some() && self.contact_url.is_none()
    }

    /// Whether this is the free/default tier.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price_id.is_none() && self.contact_url.is_none()
    }
}

/// Ordered, immutable tier lookup table.
#[derive(Clone, Debug)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
    default_limit: u64,
}

impl TierCatalog {
    /// Create a builder for constructing a catalog.
    #[must_use]
    pub fn builder() -> TierCatalogBuilder {
        TierCatalogBuilder::new()
    }

    /// Build a catalog from already-constructed tiers.
    ///
    /// The default limit is taken from the first free tier, falling back to
    /// [`DEFAULT_USAGE_LIMIT`].
    pub fn from_tiers(tiers: Vec<Tier>) -> Result<Self> {
        let mut builder = TierCatalogBuilder::new();
        builder.tiers = tiers;
        builder.build()
    }

    /// The stock catalog: a free tier, a paid tier for `pro_price_id`, and a
    /// contact-sales enterprise tier.
    #[must_use]
    pub fn standard(pro_price_id: &str, enterprise_contact_url: &str) -> Self {
        Self {
            tiers: vec![
                Tier {
                    id: "free".to_string(),
                    price_id: None,
                    usage_limit: DEFAULT_USAGE_LIMIT,
                    display_name: "Free".to_string(),
                    description: Some("Get started with the playground".to_string()),
                    contact_url: None,
                },
                Tier {
                    id: "pro".to_string(),
                    price_id: Some(pro_price_id.to_string()),
                    usage_limit: 100,
                    display_name: "Pro".to_string(),
                    description: Some("For production workloads".to_string()),
                    contact_url: None,
                },
                Tier {
                    id: "enterprise".to_string(),
                    price_id: None,
                    usage_limit: 10_000,
                    display_name: "Enterprise".to_string(),
                    description: Some("Custom limits and support".to_string()),
                    contact_url: Some(enterprise_contact_url.to_string()),
                },
            ],
            default_limit: DEFAULT_USAGE_LIMIT,
        }
    }

    /// Limit used when no tier matches.
    #[must_use]
    pub fn default_limit(&self) -> u64 {
        self.default_limit
    }

    /// Find a tier by its price id.
    ///
    /// Tiers without a price id never match.
    #[must_use]
    pub fn find_by_price(&self, price_id: &str) -> Option<&Tier> {
        self.tiers
            .iter()
            .find(|t| t.price_id.as_deref() == Some(price_id))
    }

    /// Find a tier by catalog key.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    /// The free tier, if the catalog has one.
    #[must_use]
    pub fn free_tier(&self) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.is_free())
    }

    /// Tier a subscription maps to, if any.
    #[must_use]
    pub fn tier_for(&self, subscription: Option<&Subscription>) -> Option<&Tier> {
        subscription
            .and_then(|s| s.price_id.as_deref())
            .and_then(|price| self.find_by_price(price))
    }

    /// Usage limit for a subscription (see [`resolve_limit`]).
    #[must_use]
    pub fn resolve(&self, subscription: Option<&Subscription>) -> u64 {
        resolve_limit(subscription.and_then(|s| s.price_id.as_deref()), self)
    }

    /// Iterate over tiers in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Map a subscription price id to its tier's usage limit.
///
/// Unknown, stale, or absent price ids resolve to the catalog's default
/// limit rather than failing.
#[must_use]
pub fn resolve_limit(price_id: Option<&str>, catalog: &TierCatalog) -> u64 {
    price_id
        .and_then(|price| catalog.find_by_price(price))
        .map_or(catalog.default_limit, |tier| tier.usage_limit)
}

/// Builder for a [`TierCatalog`].
#[derive(Debug, Default)]
pub struct TierCatalogBuilder {
    tiers: Vec<Tier>,
    default_limit: Option<u64>,
}

impl TierCatalogBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start defining a new tier.
    #[must_use]
    pub fn tier(self, id: &str) -> TierBuilder {
        TierBuilder {
            parent: self,
            tier: Tier {
                id: id.to_string(),
                price_id: None,
                usage_limit: DEFAULT_USAGE_LIMIT,
                display_name: id.to_string(),
                description: None,
                contact_url: None,
            },
        }
    }

    /// Override the fallback limit for unmatched price ids.
    #[must_use]
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = Some(limit);
        self
    }

    /// Build the catalog.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if two tiers share a catalog key or a price id.
    pub fn build(self) -> Result<TierCatalog> {
        let mut ids = HashSet::new();
        let mut prices = HashSet::new();

        for tier in &self.tiers {
            if !ids.insert(tier.id.as_str()) {
                return Err(DashboardError::bad_request(format!(
                    "Duplicate tier id in catalog: {}",
                    tier.id
                )));
            }
            if let Some(price) = tier.price_id.as_deref() {
                if !prices.insert(price) {
                    return Err(DashboardError::bad_request(format!(
                        "Duplicate price id in catalog: {}",
                        price
                    )));
                }
            }
        }

        let default_limit = self.default_limit.unwrap_or_else(|| {
            self.tiers
                .iter()
                .find(|t| t.is_free())
                .map_or(DEFAULT_USAGE_LIMIT, |t| t.usage_limit)
        });

        Ok(TierCatalog {
            tiers: self.tiers,
            default_limit,
        })
    }
}

/// Builder for a single tier.
#[derive(Debug)]
pub struct TierBuilder {
    parent: TierCatalogBuilder,
    tier: Tier,
}

impl TierBuilder {
    /// Set the payment-processor price id.
    #[must_use]
    pub fn stripe_price(mut self, price_id: &str) -> Self {
        self.tier.price_id = Some(price_id.to_string());
        self
    }

    #[must_use]
    pub fn usage_limit(mut self, limit: u64) -> Self {
        self.tier.usage_limit = limit;
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: &str) -> Self {
        self.tier.display_name = name.to_string();
        self
    }

    #[must_use]
    pub fn description(mut self, desc: &str) -> Self {
        self.tier.description = Some(desc.to_string());
        self
    }

    /// Sell this tier through a sales contact link instead of checkout.
    #[must_use]
    pub fn contact_url(mut self, url: &str) -> Self {
        self.tier.contact_url = Some(url.to_string());
        self
    }

    /// Finish this tier and return to the catalog builder.
    #[must_use]
    pub fn done(mut self) -> TierCatalogBuilder {
        self.parent.tiers.push(self.tier);
        self.parent
    }
}
