use crate::{
    app::AppContext,
    config::Config,
    health,
    http::{CheckoutApiModule, DashboardModule, RouteModule},
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// The billing dashboard server.
pub struct App {
    router: Router<AppContext>,
    config: Config,
    context: AppContext,
}

impl App {
    /// Creates the app with the dashboard routes, checkout API and `/health`.
    pub fn new(config: Config, context: AppContext) -> Self {
        let router = Router::<AppContext>::new().route("/health", get(health::health_handler));

        Self {
            router,
            config,
            context,
        }
        .register_module(DashboardModule)
        .register_module(CheckoutApiModule)
    }

    /// Register a route module with the application
    pub fn register_module<M: RouteModule>(mut self, module: M) -> Self {
        self.router = module.register(self.router);
        self
    }

    /// Router with middleware and state applied, for in-process tests.
    pub fn into_test_router(self) -> Router {
        let (router, context) = self.with_middleware();
        router.with_state(context)
    }

    /// Middleware order (outer to inner): trace, set request id, propagate
    /// request id, timeout, body limit.
    fn with_middleware(self) -> (Router<AppContext>, AppContext) {
        let mut router = self
            .router
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size));

        if self.config.server.request_timeout_seconds > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                self.config.server.request_timeout_seconds,
            )));
        }

        let router = router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http());

        (router, self.context)
    }

    /// Start the application server
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Health check available at http://{}/health", addr);

        let (router, context) = self.with_middleware();

        axum::serve(listener, router.with_state(context))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Grace period for in-flight checkout requests
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}
