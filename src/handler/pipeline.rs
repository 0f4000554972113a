//! Ordered stage pipeline
//!
//! Stages run in a fixed order and the first `Respond` wins. A panicking
//! stage aborts the request with a logged 500 instead of taking the
//! connection task down with it.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

use super::assets::AssetStage;
use super::image_proxy::{ImageProxy, ImageProxyStage};
use super::redirect::RedirectStage;
use super::renderer::RendererStage;
use super::stage::{Stage, StageOutcome};
use crate::config::Config;
use crate::http::{self, EdgeRequest, EdgeResponse};
use crate::platform::{AppRenderer, AssetStore, BackgroundTasks, EdgeCache, UpstreamFetcher};
use crate::routing::{Classifier, RedirectTable};

/// Platform collaborators the pipeline is wired with
pub struct EdgeServices {
    /// `None` disables the asset stage
    pub assets: Option<Arc<dyn AssetStore>>,
    pub cache: Arc<dyn EdgeCache>,
    pub fetcher: Arc<dyn UpstreamFetcher>,
    pub renderer: Arc<dyn AppRenderer>,
}

pub struct EdgeHandler {
    stages: Vec<Box<dyn Stage>>,
    tasks: BackgroundTasks,
}

impl EdgeHandler {
    pub fn new(stages: Vec<Box<dyn Stage>>, tasks: BackgroundTasks) -> Self {
        Self { stages, tasks }
    }

    /// Redirect, asset fallback, image proxy, renderer
    pub fn from_config(config: &Config, services: EdgeServices, tasks: BackgroundTasks) -> Self {
        let classifier = Arc::new(Classifier::new(
            RedirectTable::from_config(&config.redirects),
            &config.image_proxy.path_prefix,
        ));
        debug!(
            redirects = classifier.redirects().len(),
            proxy_prefix = classifier.proxy_prefix(),
            "Routing tables loaded"
        );

        let mut stages: Vec<Box<dyn Stage>> =
            vec![Box::new(RedirectStage::new(Arc::clone(&classifier)))];
        if let Some(store) = services.assets {
            stages.push(Box::new(AssetStage::new(
                store,
                &config.assets.assets_prefix,
            )));
        }
        let proxy = ImageProxy::new(&config.image_proxy, services.cache, services.fetcher);
        stages.push(Box::new(ImageProxyStage::new(classifier, proxy)));
        stages.push(Box::new(RendererStage::new(
            services.renderer,
            config.env.clone(),
        )));

        Self::new(stages, tasks)
    }

    pub const fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn handle(&self, req: &EdgeRequest) -> EdgeResponse {
        for stage in &self.stages {
            let outcome = AssertUnwindSafe(stage.handle(req, &self.tasks))
                .catch_unwind()
                .await;
            match outcome {
                Ok(StageOutcome::Respond(resp)) => {
                    debug!(request_id = req.request_id(), stage = stage.name(), "Stage responded");
                    return resp;
                }
                Ok(StageOutcome::Pass) => {}
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(
                        request_id = req.request_id(),
                        stage = stage.name(),
                        %reason,
                        "Stage panicked"
                    );
                    return http::build_500_response();
                }
            }
        }
        http::build_404_response()
    }
}
