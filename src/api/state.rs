use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobOrchestrator;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: JobOrchestrator) -> Self {
        let metrics = orchestrator.metrics().clone();
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            metrics,
        }
    }
}
