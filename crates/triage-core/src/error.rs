//! Error types for the triage pipeline
//!
//! One taxonomy covers the whole pipeline:
//! - Client-facing intake failures (invalid request, pool at capacity)
//! - Fatal staging failures vs. best-effort revision pinning
//! - Analysis failures, split by whether blind retry can help
//! - Delivery failures, which are logged and never escalated

use crate::analysis::AnalysisStage;
use crate::process::ProcessError;

/// Main triage error type
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Bad or missing request input
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Worker pool refused the submission
    #[error("worker pool at capacity ({capacity} pipelines admitted)")]
    AtCapacity { capacity: usize },

    /// Clone/update of the working copy failed
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Checkout of the deployed revision failed
    #[error("revision pinning failed: {0}")]
    RevisionPinningFailed(String),

    /// Connection-like or empty tool output
    #[error("transient analysis failure: {0}")]
    TransientAnalysisFailure(String),

    /// Substantial output missing required fields
    #[error("analysis output missing required fields: {missing:?}")]
    MalformedAnalysisOutput { missing: Vec<&'static str> },

    /// Every attempt (and repair) of a stage failed
    #[error("{stage} exhausted after {attempts} attempts")]
    AnalysisExhausted { stage: AnalysisStage, attempts: u32 },

    /// Request carries no channel to deliver to
    #[error("no notification channel provided")]
    MissingDestination,

    /// Notification delivery failed
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External process failure
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// Background run cancelled by shutdown
    #[error("pipeline cancelled")]
    Cancelled,
}

impl TriageError {
    /// Whether the error is returned synchronously to the submitter
    #[inline]
    #[must_use]
    pub fn is_client_facing(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::AtCapacity { .. })
    }

    /// Whether a blind retry of the same stage may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientAnalysisFailure(_) | Self::Process(ProcessError::Timeout { .. })
        )
    }

    /// Whether the background run must stop
    #[inline]
    #[must_use]
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(
            self,
            Self::RevisionPinningFailed(_) | Self::DeliveryFailed(_)
        )
    }
}

/// Configuration errors, reported at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required variables are unset or blank
    #[error("missing required environment variables: {0:?}")]
    MissingVars(Vec<String>),

    /// A variable failed to parse
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}
