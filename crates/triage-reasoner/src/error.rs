//! Reasoning tool errors

use triage_core::ProcessError;

/// Failure to obtain any output from the reasoning tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Prompt was empty
    #[error("refusing to invoke reasoning tool with an empty prompt")]
    EmptyPrompt,

    /// Event-stream mode was requested without a working directory
    #[error("event-stream invocation needs a working directory")]
    MissingWorkingDir,

    /// The process could not be run to completion
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ToolError {
    /// Whether the invocation hit its deadline
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Process(ProcessError::Timeout { .. }))
    }
}
