//! Server URL validation and normalization.
//!
//! Dataverse organization URLs follow a fixed shape: a subdomain, a regional
//! `crmN` segment, and one of the known cloud suffixes. Validation is purely
//! syntactic; no network call is made.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Pattern covering the known Dataverse regional domain suffixes.
const SERVER_URL_PATTERN: &str =
    r"([\w-]+)\.crm([0-9]*)\.(microsoftdynamics|dynamics|crm[\w-]*)\.(com|de|us|cn)";

fn server_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SERVER_URL_PATTERN).expect("server URL pattern is valid"))
}

/// Check whether a string looks like a Dataverse organization URL.
pub fn validate_server_url(server_url: &str) -> bool {
    server_url_regex().is_match(server_url)
}

/// Normalize a server URL, defaulting a missing scheme to `https`.
pub fn normalize_server_url(server_url: &str) -> String {
    let trimmed = server_url.trim();
    let lower = trimmed.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Extract the organization host from a (possibly scheme-less) server URL.
///
/// The host is used as the key for cached OAuth tokens, so two URLs that
/// differ only in scheme or trailing slash resolve to the same cache entry.
pub fn organization_host(server_url: &str) -> Option<String> {
    let normalized = normalize_server_url(server_url);
    Url::parse(&normalized)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_known_suffixes() {
        assert!(validate_server_url("org1.crm4.dynamics.com"));
        assert!(validate_server_url("https://contoso.crm.dynamics.com"));
        assert!(validate_server_url("my-org.crm2.microsoftdynamics.de"));
        assert!(validate_server_url("gov.crm9.dynamics.us"));
        assert!(validate_server_url("cn-org.crm.crm-partner.cn"));
    }

    #[test]
    fn test_validate_rejects_other_domains() {
        assert!(!validate_server_url("example.com"));
        assert!(!validate_server_url("crm.dynamics.com")); // no subdomain segment
        assert!(!validate_server_url(""));
        assert!(!validate_server_url("org1.dynamics.com")); // missing crm segment
    }

    #[test]
    fn test_normalize_adds_https() {
        assert_eq!(
            normalize_server_url("org1.crm4.dynamics.com"),
            "https://org1.crm4.dynamics.com"
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_scheme() {
        assert_eq!(
            normalize_server_url("http://org1.crm4.dynamics.com"),
            "http://org1.crm4.dynamics.com"
        );
        assert_eq!(
            normalize_server_url("HTTPS://org1.crm4.dynamics.com/"),
            "HTTPS://org1.crm4.dynamics.com"
        );
    }

    #[test]
    fn test_normalize_strips_trailing_slash_and_whitespace() {
        assert_eq!(
            normalize_server_url("  org1.crm4.dynamics.com/  "),
            "https://org1.crm4.dynamics.com"
        );
    }

    #[test]
    fn test_organization_host() {
        assert_eq!(
            organization_host("Org1.CRM4.dynamics.com/"),
            Some("org1.crm4.dynamics.com".to_string())
        );
        assert_eq!(
            organization_host("https://org1.crm4.dynamics.com"),
            Some("org1.crm4.dynamics.com".to_string())
        );
        assert_eq!(organization_host("   "), None);
    }
}
