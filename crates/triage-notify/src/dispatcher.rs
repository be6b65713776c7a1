//! Result dispatcher
//!
//! Builds the delivery prompt and runs it once in text mode, restricted to
//! the channel-posting tools. The tool's stdout and stderr are logged in
//! full; there is no delivery receipt to inspect.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{AnalysisId, Destination, TriageConfig, TriageError, ValidatedAnalysis};
use triage_reasoner::{IntegrationStatus, InvocationOptions, ReasoningTool};

/// Prompt file with posting and formatting instructions
pub const DELIVERY_PROMPT_FILE: &str = "delivery_prompt.md";

/// Everything the delivery prompt embeds besides the analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    /// Integration queried at pre-flight
    pub integration: String,
    /// Tools the delivery invocation may use
    pub allowed_tools: Vec<String>,
    /// Feedback link for readers of the post
    pub feedback_url: Option<String>,
    /// Commit-author to channel-user mapping
    pub user_mapping: Option<String>,
    /// Public browse URL of the analyzed repository
    pub repository_url: String,
    /// Instruction file the tool is told to read
    pub prompt_file: PathBuf,
    /// Deadline of the delivery invocation
    pub timeout: Duration,
}

impl DeliverySettings {
    /// Settings from service configuration
    #[must_use]
    pub fn from_config(config: &TriageConfig) -> Self {
        Self {
            integration: config.notification.integration.clone(),
            allowed_tools: config.notification.allowed_tools.clone(),
            feedback_url: config.notification.feedback_url.clone(),
            user_mapping: config.notification.user_mapping.clone(),
            repository_url: config.repository.public_url(),
            prompt_file: config.reasoner.prompt_path(DELIVERY_PROMPT_FILE),
            timeout: config.reasoner.delivery_timeout(),
        }
    }
}

/// Result of the single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Tool exited cleanly
    Delivered,
    /// Tool failed; already logged
    Failed(String),
}

impl DeliveryOutcome {
    #[inline]
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Failure as a taxonomy error, for callers that record it
    #[must_use]
    pub fn error(&self) -> Option<TriageError> {
        match self {
            Self::Delivered => None,
            Self::Failed(reason) => Some(TriageError::DeliveryFailed(reason.clone())),
        }
    }
}

/// Posts validated analyses to the requester's channel
#[derive(Debug, Clone)]
pub struct ResultDispatcher {
    tool: Arc<dyn ReasoningTool>,
    settings: DeliverySettings,
}

impl ResultDispatcher {
    /// Create dispatcher
    #[must_use]
    pub fn new(tool: Arc<dyn ReasoningTool>, settings: DeliverySettings) -> Self {
        Self { tool, settings }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Check the channel-posting integration; a missing connection only warns
    pub async fn preflight(&self) -> IntegrationStatus {
        let name = &self.settings.integration;
        let status = match self.tool.integration_status(name).await {
            Ok(status) => status,
            Err(e) => IntegrationStatus::NotConnected(e.to_string()),
        };
        match &status {
            IntegrationStatus::Connected => tracing::info!("Integration {} connected", name),
            IntegrationStatus::NotConnected(report) => tracing::warn!(
                "Integration {} is not connected, deliveries will fail: {}",
                name,
                report
            ),
        }
        status
    }

    /// Delivery prompt for one analysis
    #[must_use]
    pub fn prompt(&self, analysis: &ValidatedAnalysis, channel: &str, thread: Option<&str>) -> String {
        format!(
            "Slack Channel ID: {channel}\n\
             Slack Thread ID: {}\n\
             analysis_result: {}\n\
             FEEDBACK_URL: {}\n\
             GITHUB_SLACK_USER_MAPPING: {}\n\
             github_repo_url: {}\n\
             Read {} and follow its instructions to post the analysis result.",
            thread.unwrap_or("None"),
            analysis.as_str(),
            self.settings.feedback_url.as_deref().unwrap_or(""),
            self.settings.user_mapping.as_deref().unwrap_or(""),
            self.settings.repository_url,
            self.settings.prompt_file.display()
        )
    }

    /// Deliver `analysis` to `destination` in a single attempt
    ///
    /// # Errors
    /// `TriageError::MissingDestination` when no channel is given. Tool
    /// failures are logged and returned as [`DeliveryOutcome::Failed`].
    pub async fn deliver(
        &self,
        id: &AnalysisId,
        analysis: &ValidatedAnalysis,
        destination: &Destination,
    ) -> Result<DeliveryOutcome, TriageError> {
        let channel = destination.channel().ok_or_else(|| {
            tracing::error!("No channel for {}, analysis not delivered", id);
            TriageError::MissingDestination
        })?;

        let prompt = self.prompt(analysis, channel, destination.thread());
        tracing::info!("Delivery prompt for {}:\n{}", id, prompt);

        let options = InvocationOptions::text()
            .with_allowed_tools(&self.settings.allowed_tools)
            .with_timeout(self.settings.timeout);

        let outcome = match self.tool.invoke(&prompt, &options).await {
            Ok(output) => {
                tracing::info!("Delivery stdout:\n{}", output.text);
                if !output.stderr.is_empty() {
                    tracing::warn!("Delivery stderr:\n{}", output.stderr);
                }
                if output.succeeded() {
                    DeliveryOutcome::Delivered
                } else {
                    DeliveryOutcome::Failed(format!(
                        "delivery tool exited with {:?}",
                        output.exit_code
                    ))
                }
            }
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        };

        match &outcome {
            DeliveryOutcome::Delivered => {
                tracing::info!("Delivered {} to channel {}", id, channel);
            }
            DeliveryOutcome::Failed(reason) => {
                tracing::error!("Delivery of {} failed: {}", id, reason);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = TriageConfig::default();
        config.repository.github_project = "acme/shop".into();
        config.reasoner.delivery_timeout_secs = 45;

        let settings = DeliverySettings::from_config(&config);

        assert_eq!(settings.repository_url, "https://github.com/acme/shop");
        assert_eq!(settings.prompt_file, PathBuf::from("prompts/delivery_prompt.md"));
        assert_eq!(settings.timeout, Duration::from_secs(45));
        assert_eq!(settings.allowed_tools, vec!["mcp__slack"]);
    }

    #[test]
    fn failed_outcome_maps_to_delivery_error() {
        assert!(DeliveryOutcome::Delivered.error().is_none());
        assert!(matches!(
            DeliveryOutcome::Failed("exit 1".into()).error(),
            Some(TriageError::DeliveryFailed(_))
        ));
    }
}
