use axum::Router;
use crate::app::AppContext;

/// Trait for composable route modules
///
/// Each module contributes a group of routes that share the application's
/// [`AppContext`] state.
///
/// # Example
///
/// ```ignore
/// struct DashboardModule;
///
/// impl RouteModule for DashboardModule {
///     fn routes(&self) -> Router<AppContext> {
///         Router::new().route("/pricing", get(pricing_page))
///     }
///
///     fn prefix(&self) -> Option<&str> {
///         Some("/dashboard")
///     }
/// }
/// ```
pub trait RouteModule {
    /// Returns a router with all routes for this module
    ///
    /// The router should NOT have state applied; the App applies
    /// `AppContext` once all modules are merged.
    fn routes(&self) -> Router<AppContext>
    where
        Self: Sized;

    /// Optional: specify a path prefix for all routes in this module
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Registers this module's routes into the application router
    fn register(self, router: Router<AppContext>) -> Router<AppContext>
    where
        Self: Sized,
    {
        let routes = self.routes();

        if let Some(prefix) = self.prefix() {
            router.nest(prefix, routes)
        } else {
            router.merge(routes)
        }
    }
}
