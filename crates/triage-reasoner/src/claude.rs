//! `claude` CLI implementation of [`ReasoningTool`]
//!
//! Command shapes:
//! - text: `claude -p <prompt>`
//! - event stream: `claude --add-dir <dir> -p --verbose --output-format stream-json <prompt>`
//! - integration status: `claude mcp get <name>`
//!
//! `--allowedTools` is appended last when tools are restricted.

use crate::error::ToolError;
use crate::events::StreamTranscript;
use crate::tool::{IntegrationStatus, InvocationOptions, OutputMode, ReasoningTool, ToolOutput};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{CommandRunner, CommandSpec};

/// Deadline for status queries, which never do model work
const STATUS_TIMEOUT: Duration = Duration::from_secs(60);

/// Drives the `claude` binary through a [`CommandRunner`]
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl ClaudeCli {
    /// Create adapter invoking `binary`
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    /// Binary being invoked
    #[inline]
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Command line for one invocation
    ///
    /// # Errors
    /// `ToolError::MissingWorkingDir` for event-stream mode without a directory.
    pub fn command_for(
        &self,
        prompt: &str,
        options: &InvocationOptions,
    ) -> Result<CommandSpec, ToolError> {
        let mut spec = CommandSpec::new(&self.binary);
        match options.mode {
            OutputMode::Text => {
                spec = spec.args(["-p", prompt]);
            }
            OutputMode::EventStream => {
                let dir = options
                    .working_dir
                    .as_ref()
                    .ok_or(ToolError::MissingWorkingDir)?;
                spec = spec
                    .arg("--add-dir")
                    .arg(dir.to_string_lossy())
                    .args(["-p", "--verbose", "--output-format", "stream-json", prompt]);
            }
        }
        if !options.allowed_tools.is_empty() {
            spec = spec
                .arg("--allowedTools")
                .arg(options.allowed_tools.join(","));
        }
        if let Some(timeout) = options.timeout {
            spec = spec.timeout(timeout);
        }
        Ok(spec)
    }
}

#[async_trait]
impl ReasoningTool for ClaudeCli {
    async fn invoke(
        &self,
        prompt: &str,
        options: &InvocationOptions,
    ) -> Result<ToolOutput, ToolError> {
        if prompt.trim().is_empty() {
            return Err(ToolError::EmptyPrompt);
        }
        let spec = self.command_for(prompt, options)?;

        match options.mode {
            OutputMode::Text => {
                let output = self.runner.run(&spec).await?;
                Ok(ToolOutput {
                    text: output.stdout.trim().to_string(),
                    stderr: output.stderr,
                    exit_code: output.status,
                    transcript: Vec::new(),
                })
            }
            OutputMode::EventStream => {
                let transcript = Mutex::new(StreamTranscript::new());
                let on_line = |line: &str| {
                    for rendered in transcript.lock().push_line(line) {
                        tracing::info!("{}", rendered);
                    }
                };
                let output = self.runner.run_streaming(&spec, &on_line).await?;
                let (lines, candidate) = transcript.into_inner().into_parts();
                Ok(ToolOutput {
                    text: candidate,
                    stderr: output.stderr,
                    exit_code: output.status,
                    transcript: lines,
                })
            }
        }
    }

    async fn integration_status(&self, name: &str) -> Result<IntegrationStatus, ToolError> {
        let spec = CommandSpec::new(&self.binary)
            .args(["mcp", "get", name])
            .timeout(STATUS_TIMEOUT);
        let output = self.runner.run(&spec).await?;

        if output.success() && output.stdout.contains("Connected") {
            Ok(IntegrationStatus::Connected)
        } else {
            let report = if output.stdout.trim().is_empty() {
                output.stderr.trim().to_string()
            } else {
                output.stdout.trim().to_string()
            };
            Ok(IntegrationStatus::NotConnected(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::TokioCommandRunner;

    fn cli() -> ClaudeCli {
        ClaudeCli::new(Arc::new(TokioCommandRunner::new()), "claude")
    }

    #[test]
    fn text_mode_command() {
        let spec = cli().command_for("hello", &InvocationOptions::text()).unwrap();
        assert_eq!(spec.program, "claude");
        assert_eq!(spec.args, vec!["-p", "hello"]);
        assert!(spec.timeout.is_none());
    }

    #[test]
    fn event_stream_command() {
        let options = InvocationOptions::event_stream("/work/run-1")
            .with_timeout(Duration::from_secs(900));
        let spec = cli().command_for("analyze", &options).unwrap();
        assert_eq!(
            spec.args,
            vec![
                "--add-dir",
                "/work/run-1",
                "-p",
                "--verbose",
                "--output-format",
                "stream-json",
                "analyze"
            ]
        );
        assert_eq!(spec.timeout, Some(Duration::from_secs(900)));
    }

    #[test]
    fn allowed_tools_are_appended() {
        let options = InvocationOptions::text()
            .with_allowed_tools(&["mcp__slack".to_string(), "Read".to_string()]);
        let spec = cli().command_for("post", &options).unwrap();
        assert_eq!(spec.args, vec!["-p", "post", "--allowedTools", "mcp__slack,Read"]);
    }

    #[test]
    fn event_stream_needs_directory() {
        let options = InvocationOptions {
            mode: OutputMode::EventStream,
            ..InvocationOptions::default()
        };
        assert!(matches!(
            cli().command_for("x", &options),
            Err(ToolError::MissingWorkingDir)
        ));
    }
}
