//! Live Stripe payment backend.
//!
//! Creates hosted checkout sessions with retry logic, secure API key
//! handling, and error mapping onto [`DashboardError`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::payment::{CheckoutSession, CreateCheckoutSessionRequest, PaymentBackend};
use crate::error::{DashboardError, Result};

/// Metadata key carrying the dashboard user id.
const META_USER_ID: &str = "user_id";
/// Metadata key carrying the purchased price id.
const META_PRICE_ID: &str = "price_id";

/// Configuration for the live Stripe client.
#[derive(Debug, Clone)]
pub struct LiveStripeClientConfig {
    /// Maximum number of retry attempts for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LiveStripeClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_seconds: 30,
        }
    }
}

impl LiveStripeClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Error returned when API key validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid Stripe API key: {reason}")]
pub struct InvalidApiKeyError {
    pub reason: String,
}

/// Validate a Stripe secret or restricted key format.
fn validate_api_key(key: &str) -> std::result::Result<(), InvalidApiKeyError> {
    const PREFIXES: [&str; 4] = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"];

    if key.is_empty() {
        return Err(InvalidApiKeyError {
            reason: "API key is empty".to_string(),
        });
    }

    let Some(prefix) = PREFIXES.iter().find(|p| key.starts_with(*p)) else {
        return Err(InvalidApiKeyError {
            reason: "API key must start with sk_test_, sk_live_, rk_test_, or rk_live_".to_string(),
        });
    };

    if key.len() <= prefix.len() {
        return Err(InvalidApiKeyError {
            reason: "API key is missing its secret part".to_string(),
        });
    }

    Ok(())
}

/// Production Stripe client.
///
/// ```rust,ignore
/// let client = LiveStripeClient::new(
///     std::env::var("STRIPE_SECRET_KEY")?,
///     LiveStripeClientConfig::default(),
/// )?;
/// ```
#[derive(Clone)]
pub struct LiveStripeClient {
    client: stripe::Client,
    config: LiveStripeClientConfig,
    api_key: SecretString,
}

impl LiveStripeClient {
    /// Create a new live Stripe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key format is invalid.
    pub fn new(
        api_key: impl Into<SecretString>,
        config: LiveStripeClientConfig,
    ) -> std::result::Result<Self, InvalidApiKeyError> {
        let api_key: SecretString = api_key.into();
        validate_api_key(api_key.expose_secret())?;

        let client = stripe::Client::new(api_key.expose_secret()).with_app_info(
            env!("CARGO_PKG_NAME").to_string(),
            Some(env!("CARGO_PKG_VERSION").to_string()),
            None,
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Whether the client uses a test mode key.
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        let key = self.api_key.expose_secret();
        key.starts_with("sk_test_") || key.starts_with("rk_test_")
    }

    fn idempotent_client(&self, operation: &str) -> stripe::Client {
        let key = format!("{}_{}", operation, uuid::Uuid::new_v4());
        self.client
            .clone()
            .with_strategy(stripe::RequestStrategy::Idempotent(key))
    }
}

impl std::fmt::Debug for LiveStripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStripeClient")
            .field("config", &self.config)
            .field("is_test_mode", &self.is_test_mode())
            .finish_non_exhaustive()
    }
}

/// Execute an operation with timeout and retries on 429, 5xx, and timeouts.
async fn with_retry<T, F, Fut>(
    config: &LiveStripeClientConfig,
    operation: &str,
    operation_fn: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, stripe::StripeError>>,
{
    let timeout_duration = Duration::from_secs(config.timeout_seconds);
    let mut attempts = 0;

    loop {
        let result = tokio::time::timeout(timeout_duration, operation_fn()).await;

        match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if !is_retryable_error(&e) || attempts >= config.max_retries {
                    return Err(map_stripe_error(e, operation));
                }

                let delay =
                    calculate_backoff_delay(attempts, config.base_delay_ms, config.max_delay_ms);
                tracing::warn!(
                    target: "dashboard_billing::stripe",
                    operation = operation,
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying Stripe API call after transient error"
                );
                tokio::time::sleep(delay).await;
                attempts += 1;
            }
            Err(_timeout) => {
                if attempts >= config.max_retries {
                    return Err(DashboardError::RequestTimeout);
                }

                tracing::warn!(
                    target: "dashboard_billing::stripe",
                    operation = operation,
                    attempt = attempts + 1,
                    timeout_seconds = config.timeout_seconds,
                    "Stripe API request timed out, retrying"
                );
                tokio::time::sleep(calculate_backoff_delay(
                    attempts,
                    config.base_delay_ms,
                    config.max_delay_ms,
                ))
                .await;
                attempts += 1;
            }
        }
    }
}

fn is_retryable_error(error: &stripe::StripeError) -> bool {
    match error {
        stripe::StripeError::Stripe(request_error) => {
            let status = request_error.http_status;
            status == 429 || (500..600).contains(&status)
        }
        stripe::StripeError::Timeout => true,
        _ => false,
    }
}

/// Exponential backoff (`base_ms * 2^attempt`, capped) with 0-25% jitter.
fn calculate_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(attempt));
    let delay_ms = delay_ms.min(max_ms);

    let jitter = if delay_ms > 0 {
        fastrand::u64(0..=delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(delay_ms.saturating_add(jitter))
}

fn map_stripe_error(error: stripe::StripeError, operation: &str) -> DashboardError {
    match error {
        stripe::StripeError::Stripe(request_error) => {
            let message = request_error
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::error!(
                target: "dashboard_billing::stripe",
                operation = operation,
                http_status = request_error.http_status,
                code = ?request_error.code,
                "Stripe API error"
            );
            DashboardError::payment_backend(message)
        }
        stripe::StripeError::Timeout => DashboardError::RequestTimeout,
        stripe::StripeError::ClientError(msg) => {
            DashboardError::service_unavailable(format!("Stripe HTTP client error: {msg}"))
        }
        other => DashboardError::internal(format!("Stripe {operation} failed: {other}")),
    }
}

#[async_trait]
impl PaymentBackend for LiveStripeClient {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let client = self.idempotent_client("create_checkout_session");

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Subscription);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.allow_promotion_codes = Some(request.allow_promotion_codes);
        params.client_reference_id = request.client_reference_id.as_deref();
        params.customer_email = request.customer_email.as_deref();
        params.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(request.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);

        let mut meta = std::collections::HashMap::new();
        meta.insert(META_PRICE_ID.to_string(), request.price_id.clone());
        if let Some(user_id) = &request.client_reference_id {
            meta.insert(META_USER_ID.to_string(), user_id.clone());
        }
        params.metadata = Some(meta);

        let session = with_retry(&self.config, "create_checkout_session", || {
            let client = client.clone();
            let params = params.clone();
            async move { stripe::CheckoutSession::create(&client, params).await }
        })
        .await?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key_valid() {
        assert!(validate_api_key("sk_test_abc123").is_ok());
        assert!(validate_api_key("sk_live_abc123").is_ok());
        assert!(validate_api_key("rk_test_abc123").is_ok());
    }

    #[test]
    fn test_validate_api_key_invalid() {
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("pk_test_abc123").is_err());
        assert!(validate_api_key("sk_test_").is_err());
    }

    #[test]
    fn test_is_test_mode() {
        let client = LiveStripeClient::new(
            "sk_test_abc123".to_string(),
            LiveStripeClientConfig::default(),
        )
        .unwrap();
        assert!(client.is_test_mode());
    }

    #[test]
    fn test_debug_does_not_expose_api_key() {
        let client = LiveStripeClient::new(
            "sk_test_supersecret".to_string(),
            LiveStripeClientConfig::default(),
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_backoff_calculation() {
        let first = calculate_backoff_delay(0, 100, 10_000);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));

        let third = calculate_backoff_delay(2, 100, 10_000);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));

        let capped = calculate_backoff_delay(20, 100, 1_000);
        assert!(capped <= Duration::from_millis(1_250));
    }

    #[test]
    fn test_backoff_with_zero_base() {
        assert_eq!(calculate_backoff_delay(3, 0, 1_000), Duration::ZERO);
    }

    #[test]
    fn test_config_builder() {
        let config = LiveStripeClientConfig::new()
            .max_retries(5)
            .base_delay_ms(50)
            .max_delay_ms(5_000)
            .timeout_seconds(10);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay_ms, 50);
        assert_eq!(config.max_delay_ms, 5_000);
        assert_eq!(config.timeout_seconds, 10);
    }
}
