//! Testing utilities for the dashboard service
//!
//! In-process router requests with assertions on the dashboard's responses,
//! plus `plan_usages` fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashboard_billing::testing::{self, UsageFixture};
//!
//! let store = InMemoryUsageStore::with_records(
//!     UsageFixture::for_user("user_1").months(&[3, 7]),
//! );
//!
//! testing::get(app, "/dashboard/pricing")
//!     .session_cookie("dashboard_session", &session_id)
//!     .execute()
//!     .await
//!     .assert_ok()
//!     .assert_json_path("usage.1.usage", json!(7))
//!     .await
//!     .assert_tier_action("pro", "Upgrade", false)
//!     .await;
//! ```

mod fixtures;
mod scenario;

pub use fixtures::UsageFixture;
pub use scenario::{Scenario, ScenarioAssert, get, post};
