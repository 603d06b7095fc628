//! Billing dashboard backend
//!
//! Shows a signed-in user's metered plan usage next to the limit of their
//! subscription tier, and starts Stripe-hosted checkout to upgrade.
//!
//! # Components
//!
//! - **Tier resolver**: maps a subscription price id to a usage limit ([`TierCatalog`])
//! - **Checkout initiator**: creates a hosted checkout session and redirects
//!   ([`CheckoutInitiator`])
//! - **Usage reader**: loads `plan_usages` rows for the session user ([`UsageReader`])
//! - **HTTP**: Axum routes for the pricing page and checkout ([`App`])
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dashboard_billing::{App, AppContext, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     dashboard_billing::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let context = AppContext::from_config(&config).await?;
//!
//!     App::new(config, context).serve().await?;
//!     Ok(())
//! }
//! ```

mod app;
pub mod billing;
mod config;
mod core;
pub mod dashboard;
mod error;
pub mod health;
pub mod http;
pub mod session;
pub mod testing;
pub mod traits;
pub mod usage;
pub mod utils;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use billing::{
    CheckoutConfig, CheckoutInitiator, CheckoutOutcome, Navigation, PaymentBackend, Price,
    Subscription, SubscriptionStatus, SubscriptionStore, Tier, TierCatalog,
};
pub use config::{
    BillingConfig, Config, ConfigBuilder, DatabaseConfig, LoggingConfig, ServerConfig,
    UsageBackend, UsageConfig,
};
pub use crate::core::App;
pub use dashboard::{CardAction, PricingPage, TierCard};
pub use error::{DashboardError, Result};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use http::RouteModule;
pub use session::{JwtSessionProvider, Session, SessionProvider, SessionUser};
pub use traits::session::{SessionData, SessionStore};
pub use usage::{PageLoad, UsageReader, UsageRecord, UsageStore};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "dashboard_billing=debug")
/// - `DASHBOARD_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from a loaded [`Config`]
///
/// `RUST_LOG` still wins over `logging.level` when set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    install_subscriber(env_filter, config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
