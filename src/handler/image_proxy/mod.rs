//! Image proxy stage
//!
//! Cache-aside fetch of allow-listed HTTPS images. Every outcome, including
//! rejections and failures, is a response; this stage never passes.

mod error;
mod validate;

pub use error::ProxyError;
pub use validate::{validate_target, ValidatedTarget};

use async_trait::async_trait;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::stage::{Stage, StageOutcome};
use crate::config::ImageProxyConfig;
use crate::http::cache::{CachePolicy, IMAGE_MAX_AGE};
use crate::http::{self, EdgeRequest, EdgeResponse, X_CACHE};
use crate::platform::{
    BackgroundTasks, CacheKey, CachedResponse, EdgeCache, FetchError, UpstreamFetcher,
};
use crate::routing::{AllowedDomains, Classifier, RequestKind};

/// How a proxied request ended, for logs and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyOutcome {
    CacheHit,
    Fetched,
    Rejected(&'static str),
    UpstreamError(StatusCode),
    Timeout,
    TooLarge,
    Failed,
}

impl fmt::Display for ProxyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit => f.write_str("cache_hit"),
            Self::Fetched => f.write_str("fetched"),
            Self::Rejected(reason) => write!(f, "rejected:{reason}"),
            Self::UpstreamError(status) => write!(f, "upstream_error:{}", status.as_u16()),
            Self::Timeout => f.write_str("timeout"),
            Self::TooLarge => f.write_str("too_large"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

impl From<&ProxyError> for ProxyOutcome {
    fn from(e: &ProxyError) -> Self {
        match e {
            ProxyError::MissingParameter => Self::Rejected("missing_parameter"),
            ProxyError::MalformedUrl(_) => Self::Rejected("malformed_url"),
            ProxyError::DisallowedScheme(_) => Self::Rejected("disallowed_scheme"),
            ProxyError::DisallowedDomain(_) => Self::Rejected("disallowed_domain"),
            ProxyError::InvalidContentType(_) => Self::Rejected("invalid_content_type"),
            ProxyError::UpstreamNonSuccess(status) => Self::UpstreamError(*status),
            ProxyError::Timeout => Self::Timeout,
            ProxyError::TooLarge(_) => Self::TooLarge,
            ProxyError::Unknown(_) => Self::Failed,
        }
    }
}

pub struct ImageProxy {
    allowed: AllowedDomains,
    cache: Arc<dyn EdgeCache>,
    fetcher: Arc<dyn UpstreamFetcher>,
    timeout: Duration,
    user_agent: String,
}

impl ImageProxy {
    pub fn new(
        config: &ImageProxyConfig,
        cache: Arc<dyn EdgeCache>,
        fetcher: Arc<dyn UpstreamFetcher>,
    ) -> Self {
        let allowed = AllowedDomains::new(&config.allowed_domains);
        debug!(domains = ?allowed.iter().collect::<Vec<_>>(), "Image proxy allow-list");
        Self {
            allowed,
            cache,
            fetcher,
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Serve one proxy request; errors are already turned into responses
    pub async fn proxy(
        &self,
        req: &EdgeRequest,
        tasks: &BackgroundTasks,
    ) -> (ProxyOutcome, EdgeResponse) {
        match self.resolve(req, tasks).await {
            Ok(served) => served,
            Err(e) => {
                let outcome = ProxyOutcome::from(&e);
                let detail = e.detail().unwrap_or_default();
                match &e {
                    ProxyError::Unknown(_) => {
                        error!(request_id = req.request_id(), %detail, "Image proxy failed");
                    }
                    ProxyError::Timeout
                    | ProxyError::TooLarge(_)
                    | ProxyError::UpstreamNonSuccess(_) => {
                        warn!(request_id = req.request_id(), %outcome, "Image upstream unavailable");
                    }
                    _ => {
                        debug!(request_id = req.request_id(), %outcome, %detail, "Image request rejected");
                    }
                }
                (outcome, e.into_response())
            }
        }
    }

    async fn resolve(
        &self,
        req: &EdgeRequest,
        tasks: &BackgroundTasks,
    ) -> Result<(ProxyOutcome, EdgeResponse), ProxyError> {
        let target = validate_target(req.query_param("url"), &self.allowed)?;
        let key = CacheKey::get(target.original.as_str());

        if let Some(hit) = self.cache.lookup(&key).await {
            let mut resp = hit.into_response();
            resp.headers_mut()
                .insert(X_CACHE, HeaderValue::from_static("HIT"));
            return Ok((ProxyOutcome::CacheHit, resp));
        }

        let upstream = tokio::time::timeout(
            self.timeout,
            self.fetcher.fetch(&target.url, &self.user_agent),
        )
        .await
        .map_err(|_| ProxyError::Timeout)?
        .map_err(|e| match e {
            FetchError::Timeout => ProxyError::Timeout,
            FetchError::TooLarge { limit } => ProxyError::TooLarge(limit),
            FetchError::Transport(detail) => ProxyError::Unknown(detail),
        })?;

        if !upstream.status.is_success() {
            return Err(ProxyError::UpstreamNonSuccess(upstream.status));
        }

        let content_type = upstream
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        if !content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
        {
            return Err(ProxyError::InvalidContentType(content_type));
        }

        let mut headers = upstream.headers;
        http::strip_hop_by_hop(&mut headers);
        CachePolicy::Public(IMAGE_MAX_AGE).apply(&mut headers);
        headers.insert(X_CACHE, HeaderValue::from_static("MISS"));

        let stored = CachedResponse::new(upstream.status, headers.clone(), upstream.body.clone());
        let cache = Arc::clone(&self.cache);
        tasks.wait_until(async move {
            let url = key.url().to_string();
            if let Err(e) = cache.put(key, stored).await {
                debug!(%url, error = %e, "Image not stored");
            }
        });

        Ok((
            ProxyOutcome::Fetched,
            http::build_bytes_response(upstream.status, headers, upstream.body),
        ))
    }
}

pub struct ImageProxyStage {
    classifier: Arc<Classifier>,
    proxy: ImageProxy,
}

impl ImageProxyStage {
    pub const fn new(classifier: Arc<Classifier>, proxy: ImageProxy) -> Self {
        Self { classifier, proxy }
    }
}

#[async_trait]
impl Stage for ImageProxyStage {
    fn name(&self) -> &'static str {
        "image_proxy"
    }

    async fn handle(&self, req: &EdgeRequest, tasks: &BackgroundTasks) -> StageOutcome {
        if !matches!(self.classifier.classify(req.path()), RequestKind::ImageProxy) {
            return StageOutcome::Pass;
        }
        let (outcome, resp) = self.proxy.proxy(req, tasks).await;
        info!(
            request_id = req.request_id(),
            %outcome,
            status = resp.status().as_u16(),
            "Image proxy"
        );
        StageOutcome::Respond(resp)
    }
}
