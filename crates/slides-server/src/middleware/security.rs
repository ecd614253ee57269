//! Security headers middleware.
//!
//! Adds security headers to all responses:
//! - Content-Security-Policy
//! - X-XSS-Protection
//! - X-Frame-Options
//! - X-Content-Type-Options

use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use tower_http::set_header::SetResponseHeaderLayer;

/// Content-Security-Policy header value.
///
/// Scripts only from the server itself; deck styles and images may be
/// inline or remote.
pub(crate) const CSP: &str = "script-src 'self'";

/// Response headers applied to every response.
pub(crate) const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("content-security-policy", CSP),
    ("x-xss-protection", "1; mode=block"),
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
];

/// Create layers that add every header in [`SECURITY_HEADERS`].
pub(crate) fn security_layers() -> [SetResponseHeaderLayer<HeaderValue>; 4] {
    SECURITY_HEADERS.map(|(name, value)| {
        SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_are_lowercase() {
        for (name, _) in SECURITY_HEADERS {
            assert_eq!(name, name.to_ascii_lowercase());
        }
    }

    #[test]
    fn test_csp_value() {
        assert!(CSP.contains("script-src 'self'"));
    }
}
