//! Sessions from the auth provider's access tokens.
//!
//! The provider signs an HS256 JWT per signed-in user and hands it to the
//! browser. Each request carries it in the session cookie (or as a bearer
//! token); the signature, expiry and audience are checked locally and the
//! subscription mirror is read for the token's subject.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{RequestContext, Session, SessionConfig, SessionProvider};
use crate::billing::SubscriptionStore;
use crate::error::{DashboardError, Result};

/// Claims read from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
}

/// Session provider verifying access tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtSessionProvider {
    decoding_key: DecodingKey,
    validation: Validation,
    config: SessionConfig,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl JwtSessionProvider {
    /// Verify tokens signed with `secret`; audience and issuer checks come
    /// from `config`.
    #[must_use]
    pub fn new(
        secret: &SecretString,
        config: SessionConfig,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[config.jwt_audience.as_str()]);
        if let Some(issuer) = &config.jwt_issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
            config,
            subscriptions,
        }
    }

    /// Build from session configuration.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when no signing secret is configured.
    pub fn from_config(
        config: &SessionConfig,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Result<Self> {
        let secret = config
            .jwt_secret
            .as_ref()
            .ok_or_else(|| DashboardError::internal("SUPABASE_JWT_SECRET is not set"))?;
        Ok(Self::new(secret, config.clone(), subscriptions))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for a bad signature, an expired token, a wrong
    /// audience or issuer, or a token using another algorithm.
    pub fn verify(&self, token: &str) -> Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| DashboardError::unauthorized(format!("Invalid token: {}", e)))
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<Session>> {
        let Some(token) = ctx.credential(&self.config) else {
            return Ok(None);
        };

        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(
                    target: "dashboard_billing::session",
                    error = %e,
                    "Rejected access token"
                );
                return Ok(None);
            }
        };

        if claims.sub.is_empty() {
            return Ok(None);
        }

        // Lookup failures propagate; they never read as "no subscription".
        let subscription = self.subscriptions.current_subscription(&claims.sub).await?;

        let mut session = Session::new(claims.sub, claims.email.as_deref());
        session.subscription = subscription;
        Ok(Some(session))
    }
}
