//! Stage outcome classification
//!
//! Classification is fixed keyword and length matching. Root-cause output is
//! checked in this order:
//! 1. valid: every required field marker present
//! 2. transient connection: empty, or mentions a connectivity failure
//! 3. empty: shorter than [`MIN_SUBSTANTIAL_CHARS`]
//! 4. malformed: substantial but missing fields, eligible for self-repair
//!
//! Lengths are counted in characters, not bytes.

use triage_core::{missing_fields, ValidatedAnalysis};

/// Output fragments that mark a connectivity failure
pub const CONNECTION_ERROR_MARKERS: [&str; 6] = [
    "Connection error",
    "Connection timeout",
    "Network error",
    "Failed to connect",
    "Connection refused",
    "API Error",
];

/// Keywords of which a valid issue summary contains at least one
pub const SUMMARY_KEYWORDS: [&str; 4] = [
    "issue_summary",
    "problem_description",
    "technical_observations",
    "問題摘要",
];

/// Shortest acceptable issue summary
pub const MIN_SUMMARY_CHARS: usize = 20;

/// Shortest root-cause output worth repairing
pub const MIN_SUBSTANTIAL_CHARS: usize = 30;

/// Why a stage attempt did not produce a valid result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Attempt succeeded
    None,
    /// Empty or connectivity-related output
    TransientConnection,
    /// Present but too short to repair
    Empty,
    /// Substantial output missing required fields
    Malformed,
}

impl FailureKind {
    /// Stable label for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::TransientConnection => "transient-connection",
            Self::Empty => "empty",
            Self::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage attempt; consumed immediately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Raw candidate text
    pub raw: String,
    /// Candidate passed validation
    pub valid: bool,
    /// Failure classification
    pub failure: FailureKind,
}

impl StageOutcome {
    /// Validated analysis, when the attempt succeeded
    #[must_use]
    pub fn into_validated(self) -> Option<ValidatedAnalysis> {
        if self.valid {
            ValidatedAnalysis::try_new(self.raw).ok()
        } else {
            None
        }
    }
}

/// Whether `output` reads like a connectivity failure
#[must_use]
pub fn is_connection_error(output: &str) -> bool {
    output.trim().is_empty()
        || CONNECTION_ERROR_MARKERS
            .iter()
            .any(|marker| output.contains(marker))
}

/// Classify a root-cause candidate
#[must_use]
pub fn classify_root_cause(output: &str) -> StageOutcome {
    let failure = if missing_fields(output).is_empty() && !output.trim().is_empty() {
        FailureKind::None
    } else if is_connection_error(output) {
        FailureKind::TransientConnection
    } else if output.chars().count() < MIN_SUBSTANTIAL_CHARS {
        FailureKind::Empty
    } else {
        FailureKind::Malformed
    };
    StageOutcome {
        raw: output.to_string(),
        valid: failure == FailureKind::None,
        failure,
    }
}

/// Whether `output` is an acceptable issue summary
#[must_use]
pub fn is_valid_summary(output: &str) -> bool {
    output.chars().count() >= MIN_SUMMARY_CHARS
        && SUMMARY_KEYWORDS.iter().any(|keyword| output.contains(keyword))
}
