//! URL classifier
//!
//! Decides which branch of the pipeline owns a request. The asset store is
//! consulted between the redirect and image-proxy branches, so `ImageProxy`
//! and `Application` only take effect after an asset miss.

use super::redirects::{RedirectRule, RedirectTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind<'a> {
    Redirect(&'a RedirectRule),
    ImageProxy,
    Application,
}

/// Immutable routing tables shared by every stage
#[derive(Debug, Clone)]
pub struct Classifier {
    redirects: RedirectTable,
    proxy_prefix: String,
}

impl Classifier {
    pub fn new(redirects: RedirectTable, proxy_prefix: impl Into<String>) -> Self {
        Self {
            redirects,
            proxy_prefix: proxy_prefix.into(),
        }
    }

    pub fn classify(&self, path: &str) -> RequestKind<'_> {
        if let Some(rule) = self.redirects.lookup(path) {
            RequestKind::Redirect(rule)
        } else if path.starts_with(&self.proxy_prefix) {
            RequestKind::ImageProxy
        } else {
            RequestKind::Application
        }
    }

    pub fn proxy_prefix(&self) -> &str {
        &self.proxy_prefix
    }

    pub const fn redirects(&self) -> &RedirectTable {
        &self.redirects
    }
}
