//! HTTP surface: route modules, handlers and response types.
//!
//! - [`DashboardModule`]: `GET /dashboard/pricing`, `POST /dashboard/checkout`
//! - [`CheckoutApiModule`]: `POST /api/create-checkout-session`

pub mod checkout;
pub mod dashboard;
pub mod response;
pub mod routes;

pub use checkout::CheckoutApiModule;
pub use dashboard::DashboardModule;
pub use response::{JsonResponse, MessageResponse, PageRedirect, RedirectBody};
pub use routes::RouteModule;
