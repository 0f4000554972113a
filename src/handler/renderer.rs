//! Terminal stage: hand the request to the application renderer

use async_trait::async_trait;
use hyper::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use super::stage::{Stage, StageOutcome};
use crate::http::{self, EdgeRequest};
use crate::platform::{AppRenderer, BackgroundTasks, PassThrough, RenderContext, RequestMeta};

pub struct RendererStage {
    renderer: Arc<dyn AppRenderer>,
    env: Arc<HashMap<String, String>>,
}

impl RendererStage {
    pub fn new(renderer: Arc<dyn AppRenderer>, env: HashMap<String, String>) -> Self {
        Self {
            renderer,
            env: Arc::new(env),
        }
    }
}

#[async_trait]
impl Stage for RendererStage {
    fn name(&self) -> &'static str {
        "renderer"
    }

    async fn handle(&self, req: &EdgeRequest, tasks: &BackgroundTasks) -> StageOutcome {
        let ctx = RenderContext {
            tasks: tasks.clone(),
            pass_through: PassThrough::default(),
            meta: RequestMeta::from_request(req),
            env: Arc::clone(&self.env),
        };
        let pass_through = ctx.pass_through.clone();

        match self.renderer.handle(req.clone(), ctx).await {
            Ok(resp) => StageOutcome::Respond(resp),
            Err(e) => {
                error!(request_id = req.request_id(), path = req.path(), error = %e, "Renderer failed");
                if pass_through.is_armed() {
                    // Nothing sits behind the edge to pass to
                    info!(request_id = req.request_id(), "Pass-through requested, no origin configured");
                }
                StageOutcome::Respond(http::build_text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                ))
            }
        }
    }
}
