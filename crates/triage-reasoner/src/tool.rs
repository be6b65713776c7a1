//! Reasoning tool seam

use crate::error::ToolError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// How the tool reports its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Plain stdout is the answer
    #[default]
    Text,
    /// Line-delimited JSON events; the answer is the final result event
    EventStream,
}

/// Per-invocation options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOptions {
    /// Output protocol
    pub mode: OutputMode,
    /// Directory the tool may read (required for event-stream mode)
    pub working_dir: Option<PathBuf>,
    /// Tools the invocation is allowed to use
    pub allowed_tools: Vec<String>,
    /// Wall-clock deadline
    pub timeout: Option<Duration>,
}

impl InvocationOptions {
    /// Text-mode options
    #[inline]
    #[must_use]
    pub fn text() -> Self {
        Self::default()
    }

    /// Event-stream options rooted at `dir`
    #[inline]
    #[must_use]
    pub fn event_stream(dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: OutputMode::EventStream,
            working_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// With allowed tools
    #[must_use]
    pub fn with_allowed_tools(mut self, tools: &[String]) -> Self {
        self.allowed_tools = tools.to_vec();
        self
    }

    /// With deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What one invocation produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Candidate answer, trimmed
    ///
    /// Text mode: stdout. Event-stream mode: the `result` field of the last
    /// terminal event, or empty when none arrived.
    pub text: String,
    /// Standard error, untouched
    pub stderr: String,
    /// Process exit code
    pub exit_code: Option<i32>,
    /// Rendered event lines (event-stream mode only)
    pub transcript: Vec<String>,
}

impl ToolOutput {
    /// Text-mode output
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Process exited zero
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// State of a named tool integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationStatus {
    /// Reported as connected
    Connected,
    /// Anything else, with the tool's own report
    NotConnected(String),
}

impl IntegrationStatus {
    /// Connected
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// External reasoning tool
#[async_trait]
pub trait ReasoningTool: Send + Sync + std::fmt::Debug {
    /// Run one prompt
    ///
    /// A non-zero exit is not an error: whatever the tool printed is
    /// returned for the caller to classify.
    async fn invoke(&self, prompt: &str, options: &InvocationOptions)
        -> Result<ToolOutput, ToolError>;

    /// Query the status of integration `name`
    async fn integration_status(&self, name: &str) -> Result<IntegrationStatus, ToolError>;
}
