//! Allowed-domain set for proxied fetches

use std::sync::Arc;
use url::Url;

/// Hostnames the image proxy may contact
///
/// A host is allowed iff it equals an entry or ends with `"." + entry`.
#[derive(Debug, Clone)]
pub struct AllowedDomains {
    domains: Arc<[String]>,
}

impl AllowedDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn permits_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    /// Scheme and host check applied to every URL the proxy will contact
    pub fn permits_url(&self, url: &Url) -> bool {
        url.scheme() == "https" && url.host_str().is_some_and(|h| self.permits_host(h))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}
