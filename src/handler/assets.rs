//! Asset fallback stage
//!
//! Best effort: a 404 or a store fault both fall through to the next stage,
//! any other response is returned with the edge cache policy applied.

use async_trait::async_trait;
use hyper::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

use super::stage::{Stage, StageOutcome};
use crate::http::cache::CachePolicy;
use crate::http::EdgeRequest;
use crate::platform::{AssetStore, BackgroundTasks};

pub struct AssetStage {
    store: Arc<dyn AssetStore>,
    assets_prefix: String,
}

impl AssetStage {
    pub fn new(store: Arc<dyn AssetStore>, assets_prefix: impl Into<String>) -> Self {
        Self {
            store,
            assets_prefix: assets_prefix.into(),
        }
    }
}

#[async_trait]
impl Stage for AssetStage {
    fn name(&self) -> &'static str {
        "assets"
    }

    async fn handle(&self, req: &EdgeRequest, _tasks: &BackgroundTasks) -> StageOutcome {
        match self.store.fetch(req).await {
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                debug!(path = req.path(), "Asset miss");
                StageOutcome::Pass
            }
            Ok(mut resp) => {
                CachePolicy::for_asset_path(req.path(), &self.assets_prefix)
                    .apply(resp.headers_mut());
                StageOutcome::Respond(resp)
            }
            Err(e) => {
                warn!(path = req.path(), error = %e, "Asset store fault, falling through");
                StageOutcome::Pass
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{self, EdgeResponse};
    use crate::platform::AssetError;
    use hyper::header::CACHE_CONTROL;
    use hyper::Method;
    use url::Url;

    /// Answers every request with a fixed status, or fails
    struct FixedStore(Option<StatusCode>);

    #[async_trait]
    impl AssetStore for FixedStore {
        async fn fetch(&self, _req: &EdgeRequest) -> Result<EdgeResponse, AssetError> {
            match self.0 {
                Some(status) => Ok(http::build_text_response(status, "asset")),
                None => Err(AssetError::Io {
                    path: "x".to_string(),
                    source: std::io::Error::other("disk on fire"),
                }),
            }
        }
    }

    async fn run(store: FixedStore, path: &str) -> StageOutcome {
        let stage = AssetStage::new(Arc::new(store), "/assets/");
        let req = EdgeRequest::new(Method::GET, Url::parse(&format!("http://localhost{path}")).unwrap());
        stage.handle(&req, &BackgroundTasks::new()).await
    }

    fn cache_control(outcome: StageOutcome) -> String {
        match outcome {
            StageOutcome::Respond(resp) => resp.headers()[CACHE_CONTROL].to_str().unwrap().to_string(),
            StageOutcome::Pass => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_long_ttl_under_assets_prefix() {
        let outcome = run(FixedStore(Some(StatusCode::OK)), "/assets/app.js").await;
        assert_eq!(cache_control(outcome), "public, max-age=31536000");
    }

    #[tokio::test]
    async fn test_short_ttl_elsewhere() {
        let outcome = run(FixedStore(Some(StatusCode::OK)), "/robots.txt").await;
        assert_eq!(cache_control(outcome), "public, max-age=300");
    }

    #[tokio::test]
    async fn test_non_404_errors_are_returned() {
        let outcome = run(FixedStore(Some(StatusCode::FORBIDDEN)), "/assets/secret").await;
        let StageOutcome::Respond(resp) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.headers()[CACHE_CONTROL], "public, max-age=31536000");
    }

    #[tokio::test]
    async fn test_miss_and_fault_fall_through() {
        assert!(matches!(
            run(FixedStore(Some(StatusCode::NOT_FOUND)), "/x").await,
            StageOutcome::Pass
        ));
        assert!(matches!(run(FixedStore(None), "/x").await, StageOutcome::Pass));
    }
}
