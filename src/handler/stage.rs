//! Pipeline stage contract

use async_trait::async_trait;

use crate::http::{EdgeRequest, EdgeResponse};
use crate::platform::BackgroundTasks;

/// Result of running one stage
#[derive(Debug)]
pub enum StageOutcome {
    /// Definitive answer; later stages are skipped
    Respond(EdgeResponse),
    /// Not handled here, try the next stage
    Pass,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, req: &EdgeRequest, tasks: &BackgroundTasks) -> StageOutcome;
}
