//! Outbound image fetches
//!
//! The proxy only sees the `UpstreamFetcher` trait; `HttpFetcher` is the
//! reqwest implementation used by the server.

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, USER_AGENT};
use hyper::StatusCode;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::routing::AllowedDomains;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Fully read upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// GET `url`, reading the whole body
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<UpstreamResponse, FetchError>;
}

/// What to do with a redirect hop the upstream asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectDecision {
    Follow,
    TooMany,
    Disallowed,
}

/// Decide on a redirect to `next`, `previous` being the URLs requested so far
///
/// Every hop is held to the same allow-list as the original target.
pub fn redirect_decision(
    allowed: &AllowedDomains,
    max_redirects: usize,
    next: &Url,
    previous: usize,
) -> RedirectDecision {
    if previous > max_redirects {
        RedirectDecision::TooMany
    } else if allowed.permits_url(next) {
        RedirectDecision::Follow
    } else {
        RedirectDecision::Disallowed
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_size: usize,
}

impl HttpFetcher {
    /// Build a client whose redirects are re-checked against the allow-list
    pub fn new(
        allowed: AllowedDomains,
        max_redirects: usize,
        max_body_size: usize,
    ) -> Result<Self, reqwest::Error> {
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            match redirect_decision(&allowed, max_redirects, attempt.url(), attempt.previous().len())
            {
                RedirectDecision::Follow => attempt.follow(),
                RedirectDecision::TooMany => {
                    debug!(target_url = %attempt.url(), max_redirects, "Redirect limit reached");
                    attempt.stop()
                }
                RedirectDecision::Disallowed => {
                    debug!(target_url = %attempt.url(), "Refusing redirect outside allow-list");
                    attempt.stop()
                }
            }
        });

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(policy)
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self {
            client,
            max_body_size,
        })
    }
}

#[async_trait]
impl UpstreamFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<UpstreamResponse, FetchError> {
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| FetchError::Transport(format!("invalid user agent: {e}")))?;

        let mut response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, agent)
            .send()
            .await?;

        let limit = self.max_body_size;
        if response
            .content_length()
            .is_some_and(|len| len > u64::try_from(limit).unwrap_or(u64::MAX))
        {
            return Err(FetchError::TooLarge { limit });
        }

        let status = response.status();
        let headers = response.headers().clone();

        // Content-Length can be absent or wrong, so count while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "Upstream fetch completed");

        Ok(UpstreamResponse {
            status,
            headers,
            body: Bytes::from(body),
        })
    }
}
