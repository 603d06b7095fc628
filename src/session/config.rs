use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::utils::get_env_with_prefix;

/// How request credentials are turned into a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Opaque session ids looked up in the in-process store
    #[default]
    Memory,
    /// Access tokens issued by the auth provider, verified locally
    Jwt,
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,

    /// Default session TTL (in seconds)
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Cookie carrying the session id or access token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Also accept `Authorization: Bearer <credential>` for API clients
    #[serde(default = "default_allow_bearer")]
    pub allow_bearer: bool,

    /// Where unauthenticated page loads are sent
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// HS256 secret the auth provider signs access tokens with. Never serialized.
    #[serde(skip)]
    pub jwt_secret: Option<SecretString>,

    /// Required `aud` claim
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Required `iss` claim, when set
    #[serde(default)]
    pub jwt_issuer: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            default_ttl_seconds: default_ttl_seconds(),
            cookie_name: default_cookie_name(),
            allow_bearer: default_allow_bearer(),
            login_path: default_login_path(),
            jwt_secret: None,
            jwt_audience: default_jwt_audience(),
            jwt_issuer: None,
        }
    }
}

impl SessionConfig {
    /// Load session configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ttl) = get_env_with_prefix("SESSION_TTL_SECONDS") {
            if let Ok(seconds) = ttl.parse() {
                config.default_ttl_seconds = seconds;
            }
        }

        if let Some(name) = get_env_with_prefix("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(allow) = get_env_with_prefix("SESSION_ALLOW_BEARER") {
            config.allow_bearer = allow.parse().unwrap_or(true);
        }

        if let Some(path) = get_env_with_prefix("LOGIN_PATH") {
            config.login_path = path;
        }

        // A configured signing secret selects token sessions unless the
        // backend is named explicitly.
        if let Some(secret) = get_env_with_prefix("SUPABASE_JWT_SECRET") {
            config.jwt_secret = Some(SecretString::from(secret));
            config.backend = SessionBackend::Jwt;
        }
        if let Some(backend) = get_env_with_prefix("SESSION_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                "jwt" | "supabase" => SessionBackend::Jwt,
                _ => SessionBackend::Memory,
            };
        }
        if let Some(audience) = get_env_with_prefix("JWT_AUDIENCE") {
            config.jwt_audience = audience;
        }
        if let Some(issuer) = get_env_with_prefix("JWT_ISSUER") {
            config.jwt_issuer = Some(issuer);
        }

        config
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

fn default_ttl_seconds() -> u64 {
    3600 * 24 // 24 hours
}

fn default_cookie_name() -> String {
    "dashboard_session".to_string()
}

fn default_allow_bearer() -> bool {
    true
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_jwt_audience() -> String {
    "authenticated".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "dashboard_session");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.default_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.backend, SessionBackend::Memory);
        assert_eq!(config.jwt_audience, "authenticated");
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        let config: SessionConfig = serde_json::from_str(r#"{"backend":"jwt"}"#).unwrap();
        assert_eq!(config.backend, SessionBackend::Jwt);
        assert_eq!(config.cookie_name, "dashboard_session");
    }

    #[test]
    fn test_from_env() {
        // SAFETY: Test runs single-threaded for env var access
        unsafe {
            std::env::set_var("DASHBOARD_SESSION_COOKIE_NAME", "sb-access");
            std::env::set_var("DASHBOARD_SESSION_TTL_SECONDS", "60");
        }

        let config = SessionConfig::from_env();
        assert_eq!(config.cookie_name, "sb-access");
        assert_eq!(config.default_ttl_seconds, 60);

        // SAFETY: Test cleanup
        unsafe {
            std::env::remove_var("DASHBOARD_SESSION_COOKIE_NAME");
            std::env::remove_var("DASHBOARD_SESSION_TTL_SECONDS");
        }
    }
}
