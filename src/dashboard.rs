//! Pricing page view model.
//!
//! Combines the loaded usage, the resolved limit, the tier cards with their
//! call to action, and the customer portal link into one serializable value.

use serde::Serialize;

use crate::billing::{
    LoadingIndicators, Navigation, PortalLink, Subscription, Tier, TierCatalog,
};
use crate::session::SessionUser;
use crate::usage::{DashboardData, UsageRecord};

/// What a tier card's button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", rename_all_fields = "camelCase", tag = "kind")]
pub enum CardAction {
    /// Start checkout for `price_id`.
    Checkout {
        price_id: String,
        label: &'static str,
        loading: bool,
    },
    /// Link out to sales.
    Contact { href: String, label: &'static str },
}

impl CardAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Checkout { label, .. } | Self::Contact { label, .. } => *label,
        }
    }
}

/// One tier on the pricing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCard {
    pub id: String,
    pub display_name: String,
    pub description: Option<String>,
    pub usage_limit: u64,
    /// The user's current plan.
    pub current: bool,
    /// `None` for tiers without a button (the free tier).
    pub action: Option<CardAction>,
}

impl TierCard {
    fn build(
        tier: &Tier,
        current: bool,
        subscription: Option<&Subscription>,
        is_loading: impl Fn(&str) -> bool,
    ) -> Self {
        let action = if let Some(href) = &tier.contact_url {
            Some(CardAction::Contact {
                href: href.clone(),
                label: "Contact us",
            })
        } else {
            tier.price_id.as_ref().map(|price_id| {
                let loading = is_loading(price_id);
                let label = if loading {
                    "Upgrading..."
                } else if subscription.is_some_and(Subscription::is_active) {
                    "Manage plan"
                } else {
                    "Upgrade"
                };
                CardAction::Checkout {
                    price_id: price_id.clone(),
                    label,
                    loading,
                }
            })
        };

        Self {
            id: tier.id.clone(),
            display_name: tier.display_name.clone(),
            description: tier.description.clone(),
            usage_limit: tier.usage_limit,
            current,
            action,
        }
    }
}

/// Everything the pricing page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPage {
    pub user: SessionUser,
    pub usage: Vec<UsageRecord>,
    pub usage_limit: u64,
    pub subscription: Option<Subscription>,
    /// "Manage my subscription" link, only for active subscribers.
    pub portal: Option<Navigation>,
    pub tiers: Vec<TierCard>,
}

impl PricingPage {
    /// Assemble the page for a signed-in user.
    ///
    /// Loading states are this user's own in-flight checkouts.
    #[must_use]
    pub fn build(
        data: DashboardData,
        subscription: Option<&Subscription>,
        catalog: &TierCatalog,
        portal: &PortalLink,
        indicators: &LoadingIndicators,
    ) -> Self {
        let live = subscription.filter(|s| s.is_live());
        let current_id = catalog
            .tier_for(live)
            .or_else(|| catalog.free_tier())
            .map(|t| t.id.as_str());

        let user_id = data.user.id.as_str();
        let tiers = catalog
            .iter()
            .map(|tier| {
                TierCard::build(
                    tier,
                    current_id == Some(tier.id.as_str()),
                    subscription,
                    |price_id| indicators.is_loading(user_id, price_id),
                )
            })
            .collect();

        Self {
            user: data.user,
            usage: data.usage,
            usage_limit: catalog.resolve(subscription),
            subscription: subscription.cloned(),
            portal: portal.for_subscription(subscription),
            tiers,
        }
    }

    #[must_use]
    pub fn card(&self, tier_id: &str) -> Option<&TierCard> {
        self.tiers.iter().find(|c| c.id == tier_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{PortalConfig, SubscriptionStatus};

    const PORTAL: &str = "https://billing.stripe.com/p/login/test";

    fn catalog() -> TierCatalog {
        TierCatalog::standard("price_123", "https://example.com/sales")
    }

    fn data() -> DashboardData {
        DashboardData {
            user: SessionUser {
                id: "user_1".to_string(),
                email: None,
            },
            usage: Vec::new(),
        }
    }

    fn portal() -> PortalLink {
        PortalLink::from_config(&PortalConfig::new().url(PORTAL)).unwrap()
    }

    fn page(subscription: Option<&Subscription>, indicators: &LoadingIndicators) -> PricingPage {
        PricingPage::build(data(), subscription, &catalog(), &portal(), indicators)
    }

    fn label(page: &PricingPage, tier_id: &str) -> &'static str {
        page.card(tier_id)
            .and_then(|c| c.action.as_ref())
            .map_or("", CardAction::label)
    }

    #[test]
    fn test_free_user_page() {
        let page = page(None, &LoadingIndicators::new());

        assert_eq!(page.usage_limit, 5);
        assert!(page.portal.is_none());
        assert!(page.card("free").unwrap().current);
        assert!(page.card("free").unwrap().action.is_none());
        assert_eq!(label(&page, "pro"), "Upgrade");
        assert_eq!(
            page.card("enterprise").unwrap().action,
            Some(CardAction::Contact {
                href: "https://example.com/sales".to_string(),
                label: "Contact us"
            })
        );
    }

    #[test]
    fn test_active_subscriber_page() {
        let sub = Subscription::new(SubscriptionStatus::Active, Some("price_123"));
        let page = page(Some(&sub), &LoadingIndicators::new());

        assert_eq!(page.usage_limit, 100);
        assert_eq!(page.portal, Some(Navigation::External(PORTAL.to_string())));
        assert!(page.card("pro").unwrap().current);
        assert!(!page.card("free").unwrap().current);
        assert_eq!(label(&page, "pro"), "Manage plan");
    }

    #[test]
    fn test_loading_card_label() {
        let indicators = LoadingIndicators::new();
        let _guard = indicators.try_begin("user_1", "price_123").unwrap();

        let page = page(None, &indicators);

        assert_eq!(
            page.card("pro").unwrap().action,
            Some(CardAction::Checkout {
                price_id: "price_123".to_string(),
                label: "Upgrading...",
                loading: true
            })
        );
    }

    #[test]
    fn test_other_users_checkout_does_not_show_loading() {
        let indicators = LoadingIndicators::new();
        let _guard = indicators.try_begin("user_2", "price_123").unwrap();

        let page = page(None, &indicators);

        assert_eq!(label(&page, "pro"), "Upgrade");
    }

    #[test]
    fn test_canceled_subscription_shows_free_as_current() {
        let sub = Subscription::new(SubscriptionStatus::Canceled, Some("price_123"));
        let page = page(Some(&sub), &LoadingIndicators::new());

        assert!(page.card("free").unwrap().current);
        assert!(!page.card("pro").unwrap().current);
        assert!(page.portal.is_none());
    }

    #[test]
    fn test_serializes_camel_case() {
        let page = page(None, &LoadingIndicators::new());
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["usageLimit"], 5);
        assert_eq!(json["tiers"][1]["action"]["kind"], "checkout");
        assert_eq!(json["tiers"][1]["action"]["priceId"], "price_123");
    }
}
