use wayfarer_core::config::GatewayConfig;

/// Check a presented bearer token against the configured one.
///
/// With no token configured every request is accepted.
pub fn validate_auth(config: &GatewayConfig, bearer: Option<&str>) -> bool {
    match config.token.as_deref() {
        None => true,
        Some(expected) => bearer == Some(expected),
    }
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn extract_bearer(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(token: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            bind: "127.0.0.1:18790".to_string(),
            token: token.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_no_token_configured_passes() {
        let config = gateway(None);
        assert!(validate_auth(&config, None));
        assert!(validate_auth(&config, Some("anything")));
    }

    #[test]
    fn test_token_required() {
        let config = gateway(Some("secret"));
        assert!(!validate_auth(&config, None));
        assert!(!validate_auth(&config, Some("wrong")));
        assert!(validate_auth(&config, Some("secret")));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Basic abc"), None);
    }
}
