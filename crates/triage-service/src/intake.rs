//! Request intake
//!
//! Validates a request, resolves its error text, assigns the analysis id and
//! hands the run to the worker pool. The acknowledgement is returned before
//! the run starts; later failures only reach the logs.

use crate::pipeline::{PipelineJob, TriagePipeline};
use crate::pool::WorkerPool;
use std::sync::Arc;
use triage_core::{Acknowledgement, AnalysisId, AnalysisRequest, ErrorInput, TriageError};
use triage_errorsource::ErrorSource;

/// Front door of the service
#[derive(Debug, Clone)]
pub struct TriageIntake {
    error_source: Arc<dyn ErrorSource>,
    pool: Arc<WorkerPool>,
    pipeline: Arc<TriagePipeline>,
}

impl TriageIntake {
    /// Create intake
    #[must_use]
    pub fn new(
        error_source: Arc<dyn ErrorSource>,
        pool: Arc<WorkerPool>,
        pipeline: Arc<TriagePipeline>,
    ) -> Self {
        Self {
            error_source,
            pool,
            pipeline,
        }
    }

    /// Pool running the submitted pipelines
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Accept a request
    ///
    /// # Errors
    /// - `TriageError::InvalidRequest` for missing or conflicting input, or an
    ///   error group that cannot be resolved to text
    /// - `TriageError::AtCapacity` when the pool is full
    pub async fn submit(&self, request: AnalysisRequest) -> Result<Acknowledgement, TriageError> {
        let (error_text, subject) = match request.error_input()? {
            ErrorInput::Group(group) => {
                let message = self.resolve_group(group).await?;
                let subject = format!(
                    "error_reporting_group_id: {group} (latest error message: {message})"
                );
                (message, subject)
            }
            ErrorInput::Text(text) => (text.to_string(), format!("error_message: {text}")),
        };

        let id = AnalysisId::generate();
        let detail = format!(
            "Will analyze {subject} and post the result to channel: {}",
            request.destination.describe()
        );

        if request.dry_run {
            tracing::info!("Dry run {} accepted: {}", id, detail);
            return Ok(Acknowledgement::accepted(id, detail, true));
        }

        let job = PipelineJob {
            id: id.clone(),
            error_text,
            thread: request.thread_context(),
            custom_instruction: request.custom_instruction().map(ToString::to_string),
            destination: request.destination.clone(),
        };
        let pipeline = Arc::clone(&self.pipeline);
        self.pool.try_spawn(&id, move |cancel| async move {
            pipeline.run(job, cancel).await;
        })?;

        tracing::info!("Accepted {}: {}", id, detail);
        Ok(Acknowledgement::accepted(id, detail, false))
    }

    async fn resolve_group(&self, group: &str) -> Result<String, TriageError> {
        match self.error_source.latest_message(group).await {
            Ok(Some(message)) if !message.trim().is_empty() => Ok(message),
            Ok(_) => Err(TriageError::InvalidRequest(format!(
                "no error message found for error_reporting_group_id {group}"
            ))),
            Err(e) => {
                tracing::warn!("Error group {} lookup failed: {}", group, e);
                Err(TriageError::InvalidRequest(format!(
                    "could not resolve error_reporting_group_id {group}: {e}"
                )))
            }
        }
    }
}
