/// Get environment variable with DASHBOARD_ prefix, falling back to unprefixed version
///
/// Checks `DASHBOARD_{key}` first, then `{key}`, so hosted deployments that
/// inject plain names (`PORT`, `DATABASE_URL`, `STRIPE_SECRET_KEY`) work unchanged.
///
/// # Examples
///
/// ```rust
/// use dashboard_billing::utils::get_env_with_prefix;
///
/// // Checks DASHBOARD_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("DASHBOARD_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a prefixed environment variable, ignoring values that fail to parse.
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("DASHBOARD_TEST_ENV_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("TEST_ENV_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("DASHBOARD_TEST_ENV_VAR");
        }

        unsafe {
            std::env::set_var("DASHBOARD_FALLBACK_ONLY", "unused");
            std::env::set_var("FALLBACK_ONLY_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("FALLBACK_ONLY_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("DASHBOARD_FALLBACK_ONLY");
            std::env::remove_var("FALLBACK_ONLY_VAR");
        }

        assert_eq!(get_env_with_prefix("DEFINITELY_NOT_SET_VAR"), None);
    }

    #[test]
    fn test_parse_env_with_prefix() {
        unsafe {
            std::env::set_var("DASHBOARD_PARSE_NUM", "42");
            std::env::set_var("DASHBOARD_PARSE_BAD", "forty-two");
        }
        assert_eq!(parse_env_with_prefix::<u32>("PARSE_NUM"), Some(42));
        assert_eq!(parse_env_with_prefix::<u32>("PARSE_BAD"), None);
        unsafe {
            std::env::remove_var("DASHBOARD_PARSE_NUM");
            std::env::remove_var("DASHBOARD_PARSE_BAD");
        }
    }
}
