//! Redirect stage: exact-path matches against the static table

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::stage::{Stage, StageOutcome};
use crate::http::{self, EdgeRequest};
use crate::platform::BackgroundTasks;
use crate::routing::{Classifier, RequestKind};

pub struct RedirectStage {
    classifier: Arc<Classifier>,
}

impl RedirectStage {
    pub const fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Stage for RedirectStage {
    fn name(&self) -> &'static str {
        "redirect"
    }

    async fn handle(&self, req: &EdgeRequest, _tasks: &BackgroundTasks) -> StageOutcome {
        match self.classifier.classify(req.path()) {
            RequestKind::Redirect(rule) => {
                debug!(path = req.path(), target = %rule.target, code = rule.code, "Redirecting");
                StageOutcome::Respond(http::build_redirect_response(&rule.target, rule.code))
            }
            RequestKind::ImageProxy | RequestKind::Application => StageOutcome::Pass,
        }
    }
}
