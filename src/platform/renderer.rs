//! Application renderer collaborator
//!
//! Whatever is not a redirect, an asset or a proxied image is handed to an
//! `AppRenderer` together with a `RenderContext` of platform capabilities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderValue, HOST};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::background::BackgroundTasks;
use crate::http::{self, EdgeRequest, EdgeResponse, X_REQUEST_ID};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("application server request failed: {0}")]
    Upstream(String),
    #[error("render failed: {0}")]
    Failed(String),
}

/// Request metadata exposed to the renderer
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
    pub remote_addr: Option<SocketAddr>,
    pub received_at: DateTime<Utc>,
    pub host: Option<String>,
}

impl RequestMeta {
    pub fn from_request(req: &EdgeRequest) -> Self {
        Self {
            request_id: req.request_id().to_string(),
            remote_addr: req.remote_addr(),
            received_at: req.received_at(),
            host: req.url().host_str().map(ToString::to_string),
        }
    }
}

/// Exception pass-through hook
///
/// A renderer arms it to ask that its failure be treated as "pass the request
/// on" rather than an application error.
#[derive(Debug, Clone, Default)]
pub struct PassThrough {
    armed: Arc<AtomicBool>,
}

impl PassThrough {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

/// Capabilities handed to the renderer for one request
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub tasks: BackgroundTasks,
    pub pass_through: PassThrough,
    pub meta: RequestMeta,
    /// Configured environment values, secrets included, untouched
    pub env: Arc<HashMap<String, String>>,
}

impl RenderContext {
    pub fn wait_until<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.wait_until(fut);
    }
}

#[async_trait]
pub trait AppRenderer: Send + Sync {
    async fn handle(&self, req: EdgeRequest, ctx: RenderContext)
        -> Result<EdgeResponse, RenderError>;
}

/// Used when no application server is configured
#[derive(Debug, Default)]
pub struct NotFoundRenderer;

#[async_trait]
impl AppRenderer for NotFoundRenderer {
    async fn handle(
        &self,
        _req: EdgeRequest,
        _ctx: RenderContext,
    ) -> Result<EdgeResponse, RenderError> {
        Ok(http::build_404_response())
    }
}

/// Forwards requests to an application server over HTTP
pub struct UpstreamRenderer {
    client: reqwest::Client,
    base: Url,
}

impl UpstreamRenderer {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    fn target_url(&self, req: &EdgeRequest) -> Url {
        let mut target = self.base.clone();
        target.set_path(req.path());
        target.set_query(req.url().query());
        target
    }
}

#[async_trait]
impl AppRenderer for UpstreamRenderer {
    async fn handle(&self, req: EdgeRequest, ctx: RenderContext) -> Result<EdgeResponse, RenderError> {
        let mut headers = req.headers().clone();
        http::strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        if let Ok(id) = HeaderValue::from_str(&ctx.meta.request_id) {
            headers.insert(X_REQUEST_ID, id);
        }
        if let Some(addr) = ctx.meta.remote_addr {
            if let Ok(ip) = HeaderValue::from_str(&addr.ip().to_string()) {
                headers.append("x-forwarded-for", ip);
            }
        }

        let response = self
            .client
            .request(req.method().clone(), self.target_url(&req))
            .headers(headers)
            .body(req.body().clone())
            .send()
            .await
            .map_err(|e| RenderError::Upstream(e.to_string()))?;

        let status = response.status();
        let mut headers = response.headers().clone();
        http::strip_hop_by_hop(&mut headers);
        let body = response
            .bytes()
            .await
            .map_err(|e| RenderError::Upstream(e.to_string()))?;

        Ok(http::build_bytes_response(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn context() -> RenderContext {
        let req = EdgeRequest::new(Method::GET, Url::parse("http://edge.local/").unwrap());
        RenderContext {
            tasks: BackgroundTasks::new(),
            pass_through: PassThrough::default(),
            meta: RequestMeta::from_request(&req),
            env: Arc::new(HashMap::new()),
        }
    }

    #[test]
    fn test_pass_through_is_shared_between_clones() {
        let ctx = context();
        let hook = ctx.pass_through.clone();
        assert!(!ctx.pass_through.is_armed());
        hook.arm();
        assert!(ctx.pass_through.is_armed());
    }

    #[test]
    fn test_meta_carries_host() {
        assert_eq!(context().meta.host.as_deref(), Some("edge.local"));
    }

    #[test]
    fn test_target_url_keeps_path_and_query() {
        let renderer = UpstreamRenderer::new(
            Url::parse("http://127.0.0.1:3000/ignored").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        let req = EdgeRequest::new(
            Method::GET,
            Url::parse("http://edge.local/projects/x?draft=1").unwrap(),
        );
        assert_eq!(
            renderer.target_url(&req).as_str(),
            "http://127.0.0.1:3000/projects/x?draft=1"
        );
    }

    #[tokio::test]
    async fn test_not_found_renderer() {
        let req = EdgeRequest::new(Method::GET, Url::parse("http://edge.local/x").unwrap());
        let resp = NotFoundRenderer.handle(req, context()).await.unwrap();
        assert_eq!(resp.status(), hyper::StatusCode::NOT_FOUND);
    }
}
