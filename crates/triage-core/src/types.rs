//! Core types for the triage pipeline
//!
//! Defines the request-side vocabulary:
//! - Analysis identifiers (correlation only, never deduplication)
//! - Triage requests and their error input
//! - Notification destinations and thread context
//! - Deployed revisions found at staging time

use crate::error::TriageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-request correlation identifier
///
/// Format: `triage-YYYYMMDD-HHMMSS-xxxxxxxx`. Two requests carrying the same
/// error text always receive distinct identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(String);

impl AnalysisId {
    /// Generate a new identifier stamped with the current time
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generate an identifier stamped with `now`
    #[must_use]
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "triage-{}-{}",
            now.format("%Y%m%d-%H%M%S"),
            &suffix[..8]
        ))
    }

    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the validated analysis is posted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Channel reference
    pub channel_id: Option<String>,
    /// Thread reference inside the channel
    pub thread_id: Option<String>,
}

impl Destination {
    /// Create destination
    #[inline]
    #[must_use]
    pub fn new(channel_id: Option<String>, thread_id: Option<String>) -> Self {
        Self {
            channel_id,
            thread_id,
        }
    }

    /// Non-blank channel reference, if any
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        non_blank(self.channel_id.as_deref())
    }

    /// Non-blank thread reference, if any
    #[must_use]
    pub fn thread(&self) -> Option<&str> {
        non_blank(self.thread_id.as_deref())
    }

    /// Human-readable channel label used in acknowledgements
    #[must_use]
    pub fn describe(&self) -> String {
        self.channel().unwrap_or("(none)").to_string()
    }
}

/// Thread-context enrichment settings for the summarization stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadContext {
    /// Caller opted into reading the thread
    pub enrich: bool,
    /// Channel holding the thread
    pub channel_id: Option<String>,
    /// Thread to read
    pub thread_id: Option<String>,
}

impl ThreadContext {
    /// Channel and thread to summarize, when enrichment applies
    ///
    /// Enrichment only happens when the flag is set *and* both references
    /// are present.
    #[must_use]
    pub fn summarization_target(&self) -> Option<(&str, &str)> {
        if !self.enrich {
            return None;
        }
        match (
            non_blank(self.channel_id.as_deref()),
            non_blank(self.thread_id.as_deref()),
        ) {
            (Some(channel), Some(thread)) => Some((channel, thread)),
            _ => None,
        }
    }
}

/// The error input a request carries, after validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorInput<'a> {
    /// Error-aggregation group to resolve
    Group(&'a str),
    /// Literal error text
    Text(&'a str),
}

/// Immutable triage request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Error-aggregation group reference
    pub error_group_id: Option<String>,
    /// Literal error text
    pub error_text: Option<String>,
    /// Notification target
    pub destination: Destination,
    /// Summarize the thread before analysis
    pub enrich_from_thread: bool,
    /// Free-text instruction appended verbatim to the analysis prompt
    pub custom_instruction: Option<String>,
    /// Preview only, schedule nothing
    pub dry_run: bool,
}

impl AnalysisRequest {
    /// Request analysing a literal error message
    #[inline]
    #[must_use]
    pub fn from_error_text(text: impl Into<String>) -> Self {
        Self {
            error_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Request analysing the latest event of an error group
    #[inline]
    #[must_use]
    pub fn from_error_group(group_id: impl Into<String>) -> Self {
        Self {
            error_group_id: Some(group_id.into()),
            ..Self::default()
        }
    }

    /// With destination
    #[inline]
    #[must_use]
    pub fn with_destination(
        mut self,
        channel_id: impl Into<String>,
        thread_id: Option<String>,
    ) -> Self {
        self.destination = Destination::new(Some(channel_id.into()), thread_id);
        self
    }

    /// With thread enrichment
    #[inline]
    #[must_use]
    pub fn with_thread_enrichment(mut self) -> Self {
        self.enrich_from_thread = true;
        self
    }

    /// With custom instruction
    #[inline]
    #[must_use]
    pub fn with_custom_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.custom_instruction = Some(instruction.into());
        self
    }

    /// As dry run
    #[inline]
    #[must_use]
    pub fn as_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Validate that exactly one error input is present
    ///
    /// Blank strings count as absent.
    ///
    /// # Errors
    /// `TriageError::InvalidRequest` when both or neither are present.
    pub fn error_input(&self) -> Result<ErrorInput<'_>, TriageError> {
        match (
            non_blank(self.error_group_id.as_deref()),
            non_blank(self.error_text.as_deref()),
        ) {
            (Some(group), None) => Ok(ErrorInput::Group(group)),
            (None, Some(text)) => Ok(ErrorInput::Text(text)),
            (Some(_), Some(_)) => Err(TriageError::InvalidRequest(
                "provide either error_reporting_group_id or error_message, not both".to_string(),
            )),
            (None, None) => Err(TriageError::InvalidRequest(
                "provide error_reporting_group_id or error_message".to_string(),
            )),
        }
    }

    /// Custom instruction, if non-blank
    #[must_use]
    pub fn custom_instruction(&self) -> Option<&str> {
        non_blank(self.custom_instruction.as_deref())
    }

    /// Thread context derived from the request
    #[must_use]
    pub fn thread_context(&self) -> ThreadContext {
        ThreadContext {
            enrich: self.enrich_from_thread,
            channel_id: self.destination.channel_id.clone(),
            thread_id: self.destination.thread_id.clone(),
        }
    }
}

/// Commit referenced by the most recent production-release tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedRevision {
    /// Release tag name
    pub tag: String,
    /// Commit hash the tag points at
    pub commit: String,
}

impl std::fmt::Display for DeployedRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.tag, self.commit)
    }
}

/// Immediate answer to an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Always `accepted`
    pub status: String,
    /// Short human message
    pub message: String,
    /// What will be analyzed and where results go
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Correlation identifier
    pub analysis_id: AnalysisId,
    /// Static completion estimate
    pub estimated_completion: String,
}

impl Acknowledgement {
    /// Estimate quoted to callers
    pub const ESTIMATED_COMPLETION: &'static str = "5-10 minutes";

    /// Build an accepted acknowledgement
    #[must_use]
    pub fn accepted(analysis_id: AnalysisId, detail: impl Into<String>, dry_run: bool) -> Self {
        let message = if dry_run {
            "Analysis in progress, results will be posted to Slack (dry run)"
        } else {
            "Analysis in progress, results will be posted to Slack"
        };
        Self {
            status: "accepted".to_string(),
            message: message.to_string(),
            detail: Some(detail.into()),
            analysis_id,
            estimated_completion: Self::ESTIMATED_COMPLETION.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
