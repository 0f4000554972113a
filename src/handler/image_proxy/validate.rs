//! Target URL validation
//!
//! Order is fixed and fails closed: presence, parse, scheme, host. Parse
//! failures stay distinguishable from policy rejections.

use url::Url;

use super::error::ProxyError;
use crate::routing::AllowedDomains;

/// A target that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedTarget {
    /// The parameter exactly as received; used as the cache key
    pub original: String,
    pub url: Url,
}

pub fn validate_target(
    raw: Option<String>,
    allowed: &AllowedDomains,
) -> Result<ValidatedTarget, ProxyError> {
    let original = raw.ok_or(ProxyError::MissingParameter)?;
    let url = Url::parse(&original).map_err(ProxyError::MalformedUrl)?;

    if url.scheme() != "https" {
        return Err(ProxyError::DisallowedScheme(url.scheme().to_string()));
    }

    let host = url.host_str().unwrap_or_default();
    if !allowed.permits_host(host) {
        return Err(ProxyError::DisallowedDomain(host.to_string()));
    }

    Ok(ValidatedTarget { original, url })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> AllowedDomains {
        AllowedDomains::new(["cdn.sanity.io", "sanity.io"])
    }

    fn check(raw: &str) -> Result<ValidatedTarget, ProxyError> {
        validate_target(Some(raw.to_string()), &allowed())
    }

    #[test]
    fn test_accepts_allowed_https() {
        let target = check("https://cdn.sanity.io/images/foo.jpg?w=200").unwrap();
        assert_eq!(target.original, "https://cdn.sanity.io/images/foo.jpg?w=200");
        assert_eq!(target.url.host_str(), Some("cdn.sanity.io"));
    }

    #[test]
    fn test_missing() {
        assert!(matches!(
            validate_target(None, &allowed()),
            Err(ProxyError::MissingParameter)
        ));
    }

    #[test]
    fn test_malformed_before_policy() {
        assert!(matches!(check("not a url"), Err(ProxyError::MalformedUrl(_))));
        assert!(matches!(check("/images/foo.jpg"), Err(ProxyError::MalformedUrl(_))));
        assert!(matches!(check("https://"), Err(ProxyError::MalformedUrl(_))));
    }

    #[test]
    fn test_scheme_checked_before_domain() {
        // Insecure scheme on an allowed domain
        assert!(matches!(
            check("http://cdn.sanity.io/a.png"),
            Err(ProxyError::DisallowedScheme(s)) if s == "http"
        ));
        // Insecure scheme on a foreign domain still reports the scheme
        assert!(matches!(
            check("http://evil.example.com/a.png"),
            Err(ProxyError::DisallowedScheme(_))
        ));
        assert!(matches!(
            check("ftp://cdn.sanity.io/a.png"),
            Err(ProxyError::DisallowedScheme(_))
        ));
        assert!(matches!(
            check("file:///etc/passwd"),
            Err(ProxyError::DisallowedScheme(_))
        ));
    }

    #[test]
    fn test_disallowed_hosts() {
        for raw in [
            "https://evil.example.com/a.png",
            "https://evilsanity.io/a.png",
            "https://cdn.sanity.io.evil.com/a.png",
            "https://127.0.0.1/a.png",
            "https://[::1]/a.png",
        ] {
            assert!(
                matches!(check(raw), Err(ProxyError::DisallowedDomain(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_userinfo_does_not_confuse_host() {
        assert!(matches!(
            check("https://cdn.sanity.io@evil.example.com/a.png"),
            Err(ProxyError::DisallowedDomain(h)) if h == "evil.example.com"
        ));
        assert!(check("https://user@images.sanity.io/a.png").is_ok());
    }
}
