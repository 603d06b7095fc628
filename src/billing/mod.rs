//! Billing module for the Stripe-backed pricing page.
//!
//! Resolves usage limits from a static tier catalog and starts hosted
//! checkout for users without a live subscription.
//!
//! # Features
//!
//! - `billing` - Enables the live Stripe client
//!
//! # Example
//!
//! ```rust,ignore
//! use dashboard_billing::billing::{
//!     CheckoutConfig, CheckoutInitiator, HostedCheckoutRedirect, LoadingIndicators, Price,
//!     TierCatalog,
//! };
//!
//! let catalog = TierCatalog::standard("price_pro", "https://example.com/contact");
//! let limit = catalog.resolve(session.subscription.as_ref());
//!
//! let initiator = CheckoutInitiator::new(
//!     Arc::new(stripe_client),
//!     Arc::new(HostedCheckoutRedirect::default()),
//!     CheckoutConfig::new(
//!         "https://app.example.com/dashboard",
//!         "https://app.example.com/dashboard/pricing",
//!     ),
//! );
//!
//! let outcome = initiator
//!     .initiate_tracked(
//!         &Price::new("price_pro"),
//!         session.subscription.as_ref(),
//!         session.customer(),
//!         &indicators,
//!     )
//!     .await;
//! ```

pub mod checkout;
#[cfg(feature = "billing")]
pub mod live_client;
pub mod payment;
pub mod portal;
pub mod subscription;
pub mod subscription_store;
pub mod tiers;

// Tier exports
pub use tiers::{
    DEFAULT_USAGE_LIMIT, Tier, TierBuilder, TierCatalog, TierCatalogBuilder, resolve_limit,
};

// Subscription exports
pub use subscription::{Subscription, SubscriptionStatus};
pub use subscription_store::{
    InMemorySubscriptionStore, RestSubscriptionStore, SubscriptionStore,
};

// Checkout exports
pub use checkout::{
    CheckoutConfig, CheckoutInitiator, CheckoutOutcome, CheckoutState, CustomerRef,
    LoadingGuard, LoadingIndicators, Price,
};

// Payment exports
pub use payment::{
    CheckoutRedirect, CheckoutSession, CreateCheckoutSessionRequest, HostedCheckoutRedirect,
    Navigation, PaymentBackend,
};

// Portal exports
pub use portal::{PortalConfig, PortalLink};

// Live client exports (production Stripe client)
#[cfg(feature = "billing")]
pub use live_client::{InvalidApiKeyError, LiveStripeClient, LiveStripeClientConfig};

// Test exports
#[cfg(any(test, feature = "test-billing"))]
pub use payment::test::{MockPaymentBackend, RecordingRedirect};
