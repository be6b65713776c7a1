//! Analysis orchestrator
//!
//! Two ordered stages, each with its own attempt budget:
//! - Stage A (optional): summarize the reporting thread in text mode; the
//!   summary replaces the error text for Stage B
//! - Stage B: root-cause analysis in event-stream mode against the staged
//!   checkout, with one self-repair call per malformed attempt
//!
//! Attempts are retried immediately, without backoff. Exhausting a stage
//! yields `AnalysisExhausted`; partial results are never returned.

use crate::outcome::{classify_root_cause, is_valid_summary, FailureKind};
use crate::prompts;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{AnalysisStage, ReasonerConfig, ThreadContext, TriageError, ValidatedAnalysis};
use triage_reasoner::{InvocationOptions, ReasoningTool, ToolOutput};

/// Attempt budgets, deadlines and prompt locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// Stage A attempts
    pub summary_max_attempts: u32,
    /// Stage B attempts
    pub analysis_max_attempts: u32,
    /// Deadline per tool invocation
    pub stage_timeout: Duration,
    /// Directory holding the prompt files
    pub prompt_dir: PathBuf,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from_config(&ReasonerConfig::default())
    }
}

impl AnalysisSettings {
    /// Settings from reasoner configuration
    #[must_use]
    pub fn from_config(config: &ReasonerConfig) -> Self {
        Self {
            summary_max_attempts: config.summary_max_attempts,
            analysis_max_attempts: config.analysis_max_attempts,
            stage_timeout: config.stage_timeout(),
            prompt_dir: config.prompt_dir.clone(),
        }
    }

    /// With Stage B attempt budget
    #[inline]
    #[must_use]
    pub fn with_analysis_attempts(mut self, attempts: u32) -> Self {
        self.analysis_max_attempts = attempts;
        self
    }

    /// With Stage A attempt budget
    #[inline]
    #[must_use]
    pub fn with_summary_attempts(mut self, attempts: u32) -> Self {
        self.summary_max_attempts = attempts;
        self
    }
}

/// Everything one analysis needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    /// Resolved error text
    pub error_text: String,
    /// Thread enrichment settings
    pub thread: ThreadContext,
    /// Appended verbatim to the Stage B prompt
    pub custom_instruction: Option<String>,
    /// Checkout the tool may read
    pub codebase_dir: PathBuf,
}

impl AnalysisInput {
    /// Input without enrichment or custom instruction
    #[must_use]
    pub fn new(error_text: impl Into<String>, codebase_dir: impl Into<PathBuf>) -> Self {
        Self {
            error_text: error_text.into(),
            thread: ThreadContext::default(),
            custom_instruction: None,
            codebase_dir: codebase_dir.into(),
        }
    }

    /// With thread context
    #[inline]
    #[must_use]
    pub fn with_thread(mut self, thread: ThreadContext) -> Self {
        self.thread = thread;
        self
    }

    /// With custom instruction
    #[inline]
    #[must_use]
    pub fn with_custom_instruction(mut self, instruction: Option<String>) -> Self {
        self.custom_instruction = instruction;
        self
    }
}

/// Runs the validated two-stage analysis
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    tool: Arc<dyn ReasoningTool>,
    settings: AnalysisSettings,
}

impl AnalysisOrchestrator {
    /// Create orchestrator
    #[must_use]
    pub fn new(tool: Arc<dyn ReasoningTool>, settings: AnalysisSettings) -> Self {
        Self { tool, settings }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Run Stage A (when enrichment applies) then Stage B
    ///
    /// # Errors
    /// `TriageError::AnalysisExhausted` naming the stage whose budget ran out.
    pub async fn analyze(&self, input: &AnalysisInput) -> Result<ValidatedAnalysis, TriageError> {
        let error_text = match input.thread.summarization_target() {
            Some((channel, thread)) => {
                tracing::info!("Stage A: summarizing thread {} in channel {}", thread, channel);
                self.summarize(&input.error_text, channel, thread).await?
            }
            None => input.error_text.clone(),
        };

        tracing::info!("Stage B: root-cause analysis in {}", input.codebase_dir.display());
        self.root_cause(&error_text, input).await
    }

    async fn summarize(
        &self,
        error_text: &str,
        channel: &str,
        thread: &str,
    ) -> Result<String, TriageError> {
        let file = self.settings.prompt_dir.join(prompts::ISSUE_SUMMARY_PROMPT_FILE);
        let prompt = prompts::issue_summary(error_text, channel, thread, &file);
        let options = InvocationOptions::text().with_timeout(self.settings.stage_timeout);
        let max = self.settings.summary_max_attempts;

        for attempt in 1..=max {
            tracing::info!("Issue summary attempt {}/{}", attempt, max);
            match self.tool.invoke(&prompt, &options).await {
                Ok(output) => {
                    log_output("issue summary", &output);
                    if is_valid_summary(&output.text) {
                        tracing::info!("Issue summary attempt {} succeeded", attempt);
                        return Ok(output.text);
                    }
                    tracing::warn!("Issue summary attempt {}/{} failed validation", attempt, max);
                }
                Err(e) => tracing::warn!("Issue summary attempt {}/{} failed: {}", attempt, max, e),
            }
        }

        tracing::error!("Issue summary exhausted after {} attempts", max);
        Err(TriageError::AnalysisExhausted {
            stage: AnalysisStage::IssueSummary,
            attempts: max,
        })
    }

    async fn root_cause(
        &self,
        error_text: &str,
        input: &AnalysisInput,
    ) -> Result<ValidatedAnalysis, TriageError> {
        let file = self.settings.prompt_dir.join(prompts::ANALYSIS_PROMPT_FILE);
        let custom = input
            .custom_instruction
            .as_deref()
            .filter(|s| !s.trim().is_empty());
        let prompt = prompts::root_cause(error_text, &file, custom);
        let options = InvocationOptions::event_stream(&input.codebase_dir)
            .with_timeout(self.settings.stage_timeout);
        let max = self.settings.analysis_max_attempts;

        for attempt in 1..=max {
            tracing::info!("Root-cause attempt {}/{}", attempt, max);
            tracing::debug!("Root-cause prompt: {}", prompt);

            let output = match self.tool.invoke(&prompt, &options).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!("Root-cause attempt {}/{} failed: {}", attempt, max, e);
                    continue;
                }
            };
            log_output("root-cause", &output);

            let outcome = classify_root_cause(&output.text);
            match outcome.failure {
                FailureKind::None => {
                    if let Some(analysis) = outcome.into_validated() {
                        tracing::info!("Root-cause attempt {} produced a valid analysis", attempt);
                        return Ok(analysis);
                    }
                }
                FailureKind::TransientConnection | FailureKind::Empty => {
                    tracing::warn!(
                        "Root-cause attempt {}/{} classified {}, retrying",
                        attempt,
                        max,
                        outcome.failure
                    );
                }
                FailureKind::Malformed => {
                    tracing::warn!(
                        "Root-cause attempt {}/{} malformed, attempting self-repair",
                        attempt,
                        max
                    );
                    if let Some(analysis) = self.repair(&outcome.raw, &file).await {
                        return Ok(analysis);
                    }
                }
            }
        }

        tracing::error!("Root-cause analysis exhausted after {} attempts", max);
        Err(TriageError::AnalysisExhausted {
            stage: AnalysisStage::RootCause,
            attempts: max,
        })
    }

    /// One text-mode reformat of a malformed analysis
    async fn repair(&self, malformed: &str, file: &std::path::Path) -> Option<ValidatedAnalysis> {
        let prompt = prompts::repair(malformed, file);
        let options = InvocationOptions::text().with_timeout(self.settings.stage_timeout);

        let output = match self.tool.invoke(&prompt, &options).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Self-repair failed: {}", e);
                return None;
            }
        };
        log_output("self-repair", &output);

        match ValidatedAnalysis::try_new(output.text) {
            Ok(analysis) => {
                tracing::info!("Self-repair produced a valid analysis");
                Some(analysis)
            }
            Err(e) => {
                tracing::warn!("Self-repair output rejected: {}", e);
                None
            }
        }
    }
}

fn log_output(stage: &str, output: &ToolOutput) {
    tracing::info!("{} output (exit {:?}): {}", stage, output.exit_code, output.text);
    if !output.stderr.trim().is_empty() {
        tracing::warn!("{} stderr: {}", stage, output.stderr.trim());
    }
}
