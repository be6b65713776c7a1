//! External process seam
//!
//! Both `git` and the reasoning tool are driven as child processes. Components
//! take an `Arc<dyn CommandRunner>` so tests can script command outputs
//! instead of spawning anything.
//!
//! Children are spawned with `kill_on_drop`, so dropping an in-flight run
//! (timeout or cancellation) terminates the process.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// External process errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Deadline expired; the child was killed
    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    /// Reading output failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Description of one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Wall-clock deadline
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create spec for `program`
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Append one argument
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// With working directory
    #[inline]
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// With environment variable
    #[inline]
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// With deadline
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether the argument list starts with `prefix`
    #[must_use]
    pub fn args_start_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (`None` when killed by a signal)
    pub status: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with `stdout`
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with exit `code` and `stderr`
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Exit code zero
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Run to completion, capturing both streams
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;

    /// Run to completion, handing each stdout line to `on_line` as it arrives
    ///
    /// The default implementation replays captured stdout after the fact.
    async fn run_streaming(
        &self,
        spec: &CommandSpec,
        on_line: &(dyn for<'l> Fn(&'l str) + Send + Sync),
    ) -> Result<CommandOutput, ProcessError> {
        let output = self.run(spec).await?;
        for line in output.stdout.lines() {
            on_line(line);
        }
        Ok(output)
    }
}

/// `tokio::process` backed runner
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    /// Create runner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> ProcessError {
        ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        }
    }

    fn timeout_error(spec: &CommandSpec, after: Duration) -> ProcessError {
        ProcessError::Timeout {
            program: spec.program.clone(),
            after,
        }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(program = %spec.program, args = ?spec.args, "spawning command");
        let child = Self::command(spec)
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Self::timeout_error(spec, limit))??,
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_streaming(
        &self,
        spec: &CommandSpec,
        on_line: &(dyn for<'l> Fn(&'l str) + Send + Sync),
    ) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(program = %spec.program, args = ?spec.args, "spawning streaming command");
        let mut child = Self::command(spec)
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

        // Drain stderr concurrently so a chatty child cannot block on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        });

        let work = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut collected = Vec::new();
            while let Some(line) = lines.next_line().await? {
                on_line(&line);
                collected.push(line);
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, collected))
        };

        let (status, collected) = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| Self::timeout_error(spec, limit))??,
            None => work.await?,
        };

        let stderr = match stderr_task.await {
            Ok(Ok(buf)) => buf,
            _ => String::new(),
        };

        Ok(CommandOutput {
            status: status.code(),
            stdout: collected.join("\n"),
            stderr,
        })
    }
}
