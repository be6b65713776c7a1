//! One background triage run
//!
//! staging -> analysis (Stage A, Stage B) -> delivery, strictly in order,
//! inside an `info_span!("pipeline", analysis_id)`. A staging or analysis
//! failure ends the run before delivery. The per-run checkout is always
//! released, including after cancellation.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use triage_analysis::{AnalysisInput, AnalysisOrchestrator};
use triage_core::{AnalysisId, Destination, ThreadContext, TriageError};
use triage_notify::{DeliveryOutcome, ResultDispatcher};
use triage_repo::{RepositoryRemote, RepositoryStager};

/// Inputs of one run, resolved at intake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    /// Run id, also used in logs and worktree names
    pub id: AnalysisId,
    /// Error text after group lookup
    pub error_text: String,
    /// Where the thread summary comes from
    pub thread: ThreadContext,
    /// Extra instruction for the analysis stage
    pub custom_instruction: Option<String>,
    /// Slack target of the result
    pub destination: Destination,
}

/// How a run ended
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Analysis posted
    Delivered,
    /// Analysis produced, delivery failed (logged, not escalated)
    DeliveryFailed(String),
    /// Run stopped before delivery
    Aborted(TriageError),
}

impl PipelineOutcome {
    #[inline]
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Stager, orchestrator and dispatcher wired for background runs
#[derive(Debug, Clone)]
pub struct TriagePipeline {
    stager: Arc<RepositoryStager>,
    remote: RepositoryRemote,
    orchestrator: AnalysisOrchestrator,
    dispatcher: ResultDispatcher,
}

impl TriagePipeline {
    /// Create pipeline
    #[must_use]
    pub fn new(
        stager: Arc<RepositoryStager>,
        remote: RepositoryRemote,
        orchestrator: AnalysisOrchestrator,
        dispatcher: ResultDispatcher,
    ) -> Self {
        Self {
            stager,
            remote,
            orchestrator,
            dispatcher,
        }
    }

    /// Execute `job` until it finishes or `cancel` fires
    pub async fn run(&self, job: PipelineJob, cancel: CancellationToken) -> PipelineOutcome {
        let span = tracing::info_span!("pipeline", analysis_id = %job.id);
        async move {
            tracing::info!("Pipeline started");
            let outcome = self.execute(&job, &cancel).await;
            match &outcome {
                PipelineOutcome::Delivered => tracing::info!("Pipeline finished, analysis delivered"),
                PipelineOutcome::DeliveryFailed(reason) => {
                    tracing::warn!("Pipeline finished, delivery failed: {}", reason);
                }
                PipelineOutcome::Aborted(e) => tracing::error!("Pipeline aborted: {}", e),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &PipelineJob, cancel: &CancellationToken) -> PipelineOutcome {
        let staged = tokio::select! {
            biased;
            () = cancel.cancelled() => return PipelineOutcome::Aborted(TriageError::Cancelled),
            staged = self.stager.stage_for_run(&self.remote, &job.id) => staged,
        };
        let checkout = match staged {
            Ok(checkout) => checkout,
            Err(e) => return PipelineOutcome::Aborted(e),
        };
        if let Some(e) = checkout.revision.pinning.error() {
            tracing::warn!("{}; analyzing the current checkout", e);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => PipelineOutcome::Aborted(TriageError::Cancelled),
            outcome = self.analyze_and_deliver(job, &checkout.path) => outcome,
        };

        self.stager.release(&checkout).await;
        outcome
    }

    async fn analyze_and_deliver(&self, job: &PipelineJob, codebase: &Path) -> PipelineOutcome {
        let input = AnalysisInput::new(job.error_text.clone(), codebase)
            .with_thread(job.thread.clone())
            .with_custom_instruction(job.custom_instruction.clone());

        let analysis = match self.orchestrator.analyze(&input).await {
            Ok(analysis) => analysis,
            Err(e) => return PipelineOutcome::Aborted(e),
        };

        match self.dispatcher.deliver(&job.id, &analysis, &job.destination).await {
            Ok(DeliveryOutcome::Delivered) => PipelineOutcome::Delivered,
            Ok(DeliveryOutcome::Failed(reason)) => PipelineOutcome::DeliveryFailed(reason),
            Err(e) => PipelineOutcome::Aborted(e),
        }
    }
}
