//! Service assembly
//!
//! Builds every component from one [`TriageConfig`]; nothing below this
//! point reads the process environment.

use crate::intake::TriageIntake;
use crate::pipeline::TriagePipeline;
use crate::pool::WorkerPool;
use std::sync::Arc;
use triage_analysis::{AnalysisOrchestrator, AnalysisSettings};
use triage_core::{CommandRunner, TokioCommandRunner, TriageConfig, TriageError};
use triage_errorsource::{CloudErrorReporting, ErrorSource};
use triage_notify::{DeliverySettings, ResultDispatcher};
use triage_reasoner::{ClaudeCli, ReasoningTool};
use triage_repo::{RepositoryRemote, RepositoryStager};

/// Wired service
#[derive(Debug, Clone)]
pub struct TriageService {
    pub intake: Arc<TriageIntake>,
    pub stager: Arc<RepositoryStager>,
    pub dispatcher: ResultDispatcher,
}

impl TriageService {
    /// Assemble the service against real processes and the cloud error source
    ///
    /// # Errors
    /// `TriageError::Config` when the error-source HTTP client cannot be built.
    pub fn from_config(config: &TriageConfig) -> Result<Self, TriageError> {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new());
        let tool: Arc<dyn ReasoningTool> =
            Arc::new(ClaudeCli::new(Arc::clone(&runner), config.reasoner.binary.clone()));
        let error_source = CloudErrorReporting::new(config.error_source.clone()).map_err(|e| {
            TriageError::Config(triage_core::ConfigError::Invalid {
                var: "error_source.http_client".to_string(),
                reason: e.to_string(),
            })
        })?;
        if !error_source.is_configured() {
            tracing::warn!("Error Reporting credentials incomplete; group lookups will be rejected");
        }
        Ok(Self::assemble(config, runner, tool, Arc::new(error_source)))
    }

    /// Assemble the service around the given collaborators
    #[must_use]
    pub fn assemble(
        config: &TriageConfig,
        runner: Arc<dyn CommandRunner>,
        tool: Arc<dyn ReasoningTool>,
        error_source: Arc<dyn ErrorSource>,
    ) -> Self {
        let stager = Arc::new(RepositoryStager::new(runner, config.repository.clone()));
        let orchestrator = AnalysisOrchestrator::new(
            Arc::clone(&tool),
            AnalysisSettings::from_config(&config.reasoner),
        );
        let dispatcher = ResultDispatcher::new(tool, DeliverySettings::from_config(config));
        let pipeline = Arc::new(TriagePipeline::new(
            Arc::clone(&stager),
            RepositoryRemote::from_config(&config.repository),
            orchestrator,
            dispatcher.clone(),
        ));
        let pool = Arc::new(WorkerPool::new(config.dispatch));
        let intake = Arc::new(TriageIntake::new(error_source, pool, pipeline));

        Self {
            intake,
            stager,
            dispatcher,
        }
    }

    /// Startup chores: clear stale worktrees, check the posting integration
    pub async fn prepare(&self) {
        self.stager.sweep_stale_worktrees().await;
        self.dispatcher.preflight().await;
    }

    /// Pool running the pipelines
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        self.intake.pool()
    }
}
