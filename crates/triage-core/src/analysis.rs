//! Validated analysis contract
//!
//! The required-field check is a substring match, not a schema parse: a
//! payload is accepted iff every marker in [`REQUIRED_FIELDS`] occurs in it
//! somewhere. Order and duplication do not matter.

use crate::error::TriageError;
use serde::{Deserialize, Serialize};

/// Field markers every root-cause analysis must contain
pub const REQUIRED_FIELDS: [&str; 7] = [
    "root_cause_analysis",
    "root_cause_file_codebase",
    "suspect_commit",
    "suspect_commit_author",
    "recommended_person",
    "recommended_reason",
    "suggestion",
];

/// Markers absent from `output`, in declaration order
#[must_use]
pub fn missing_fields(output: &str) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !output.contains(field))
        .collect()
}

/// Analysis stages run against the reasoning tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisStage {
    /// Stage A: thread summarization
    IssueSummary,
    /// Stage B: root-cause analysis
    RootCause,
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IssueSummary => f.write_str("issue summary"),
            Self::RootCause => f.write_str("root-cause analysis"),
        }
    }
}

/// Analysis text known to carry every required field
///
/// Only constructible through [`ValidatedAnalysis::try_new`], so a value of
/// this type never fails the field-presence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedAnalysis(String);

impl ValidatedAnalysis {
    /// Validate `text` against the required-field contract
    ///
    /// # Errors
    /// `TriageError::MalformedAnalysisOutput` listing the missing markers.
    pub fn try_new(text: impl Into<String>) -> Result<Self, TriageError> {
        let text = text.into();
        let missing = missing_fields(&text);
        if missing.is_empty() {
            Ok(Self(text))
        } else {
            Err(TriageError::MalformedAnalysisOutput { missing })
        }
    }

    /// Borrow the payload
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the payload
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ValidatedAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
