use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::services::{orchestrator::JobOrchestrator, storage::R2Client};

/// Long-lived collaborators shared by every job run in the process.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<R2Client>,
    pub orchestrator: Arc<JobOrchestrator>,
}

impl AppState {
    pub fn new(config: &OrchestratorConfig, storage: R2Client) -> Result<Self, reqwest::Error> {
        let storage = Arc::new(storage);
        let orchestrator = JobOrchestrator::new(config, storage.clone())?;
        Ok(Self {
            storage,
            orchestrator: Arc::new(orchestrator),
        })
    }
}
