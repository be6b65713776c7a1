//! Process configuration
//!
//! `TriageConfig` is read once at startup and handed to every component
//! constructor. Nothing else in the workspace touches the process
//! environment.
//!
//! Blank values count as unset. Required variables are reported together by
//! [`TriageConfig::validate`] so a misconfigured deployment fails with one
//! complete message.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Variables that must be set for a real (non-test) deployment
/// Upper bound on attempts for either analysis stage
pub const MAX_STAGE_ATTEMPTS: u32 = 3;

pub const REQUIRED_VARS: [&str; 4] = [
    "GITHUB_TOKEN",
    "GITHUB_PROJECT",
    "SLACK_BOT_TOKEN",
    "SLACK_TEAM_ID",
];

/// Credential value that never shows up in logs or serialized config
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw credential, for the one call site that needs it
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// No credential set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[redacted]")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable, for local development
    Compact,
    /// One JSON object per line
    Json,
}

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Working copy and remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Access token embedded in the clone URL
    pub github_token: Secret,
    /// `owner/name` of the analyzed repository
    pub github_project: String,
    /// Branch to clone and update
    pub branch: String,
    /// Shared working copy
    pub codebase_dir: PathBuf,
    /// Glob matching production-release tags
    pub release_tag_pattern: String,
    /// Explicit remote, overriding the token URL
    pub repository_url: Option<String>,
    /// Give every run its own worktree
    pub isolate_runs: bool,
    /// Parent directory of per-run worktrees
    pub worktree_dir: PathBuf,
    /// Shallow clone depth, `None` for full history
    pub clone_depth: Option<u32>,
    /// Deadline for each git command
    pub git_timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            github_token: Secret::default(),
            github_project: String::new(),
            branch: "master".to_string(),
            codebase_dir: PathBuf::from("external_codebase"),
            release_tag_pattern: "prod-*".to_string(),
            repository_url: None,
            isolate_runs: true,
            worktree_dir: PathBuf::from("external_codebase_runs"),
            clone_depth: Some(1),
            git_timeout_secs: 600,
        }
    }
}

impl RepositoryConfig {
    /// Public browse URL of the repository
    #[must_use]
    pub fn public_url(&self) -> String {
        format!("https://github.com/{}", self.github_project)
    }

    /// Git command deadline
    #[inline]
    #[must_use]
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

/// Notification channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Bot token used by the channel integration
    pub slack_bot_token: Secret,
    /// Workspace the bot posts into
    pub slack_team_id: String,
    /// Link included in every delivered analysis
    pub feedback_url: Option<String>,
    /// Commit-author to channel-user mapping table
    pub user_mapping: Option<String>,
    /// Integration name queried at pre-flight
    pub integration: String,
    /// Tools the delivery invocation may use
    pub allowed_tools: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            slack_bot_token: Secret::default(),
            slack_team_id: String::new(),
            feedback_url: None,
            user_mapping: None,
            integration: "slack".to_string(),
            allowed_tools: vec!["mcp__slack".to_string()],
        }
    }
}

/// Error Reporting API access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSourceConfig {
    /// Cloud project owning the error groups
    pub project_id: Option<String>,
    /// Service account issuing the JWT grant
    pub service_account_email: Option<String>,
    /// PEM private key of the service account
    pub private_key: Option<Secret>,
    /// API base, up to and including the version segment
    pub api_base_url: String,
    /// OAuth token endpoint
    pub token_uri: String,
}

impl Default for ErrorSourceConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            service_account_email: None,
            private_key: None,
            api_base_url: "https://clouderrorreporting.googleapis.com/v1beta1".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

impl ErrorSourceConfig {
    /// All three credential parts are present
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.project_id.is_some()
            && self.service_account_email.is_some()
            && self.private_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// Reasoning tool invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Path or name of the `claude` binary
    pub binary: String,
    /// Directory holding the prompt files
    pub prompt_dir: PathBuf,
    /// Deadline for each analysis invocation
    pub stage_timeout_secs: u64,
    /// Deadline for the delivery invocation
    pub delivery_timeout_secs: u64,
    /// Stage A attempt limit
    pub summary_max_attempts: u32,
    /// Stage B attempt limit
    pub analysis_max_attempts: u32,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            prompt_dir: PathBuf::from("prompts"),
            stage_timeout_secs: 900,
            delivery_timeout_secs: 300,
            summary_max_attempts: 3,
            analysis_max_attempts: 3,
        }
    }
}

impl ReasonerConfig {
    /// Path of a prompt file inside `prompt_dir`
    #[must_use]
    pub fn prompt_path(&self, file: &str) -> PathBuf {
        self.prompt_dir.join(file)
    }

    /// Analysis invocation deadline
    #[inline]
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    /// Delivery invocation deadline
    #[inline]
    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

/// Background pool limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Pipelines running at once
    pub max_concurrent: usize,
    /// Pipelines admitted in total (running + waiting)
    pub max_pending: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_pending: 16,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Deployment environment name (`DEV` selects human-readable logs)
    pub environment: String,
    /// Repository staging
    pub repository: RepositoryConfig,
    /// Result delivery
    pub notification: NotificationConfig,
    /// Error-source lookups
    pub error_source: ErrorSourceConfig,
    /// Reasoning tool
    pub reasoner: ReasonerConfig,
    /// Worker pool
    pub dispatch: DispatchConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            environment: "DEV".to_string(),
            repository: RepositoryConfig::default(),
            notification: NotificationConfig::default(),
            error_source: ErrorSourceConfig::default(),
            reasoner: ReasonerConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl TriageConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With repository
    #[inline]
    #[must_use]
    pub fn with_repository(mut self, repository: RepositoryConfig) -> Self {
        self.repository = repository;
        self
    }

    /// With notification settings
    #[inline]
    #[must_use]
    pub fn with_notification(mut self, notification: NotificationConfig) -> Self {
        self.notification = notification;
        self
    }

    /// With reasoner settings
    #[inline]
    #[must_use]
    pub fn with_reasoner(mut self, reasoner: ReasonerConfig) -> Self {
        self.reasoner = reasoner;
        self
    }

    /// With pool limits
    #[inline]
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// With listener address
    #[inline]
    #[must_use]
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.server = ServerConfig {
            host: host.into(),
            port,
        };
        self
    }

    /// Read from the process environment
    ///
    /// # Errors
    /// `ConfigError::Invalid` when a variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read through an arbitrary variable lookup
    ///
    /// Required variables are not checked here; call [`Self::validate`].
    ///
    /// # Errors
    /// `ConfigError::Invalid` when a variable fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();

        let server = ServerConfig {
            host: env.string("HOST").unwrap_or(defaults.server.host),
            port: env.parsed("PORT")?.unwrap_or(defaults.server.port),
        };

        let repo_defaults = defaults.repository;
        let clone_depth = match env.parsed::<u32>("CLONE_DEPTH")? {
            Some(0) => None,
            Some(depth) => Some(depth),
            None => repo_defaults.clone_depth,
        };
        let repository = RepositoryConfig {
            github_token: Secret::new(env.string("GITHUB_TOKEN").unwrap_or_default()),
            github_project: env.string("GITHUB_PROJECT").unwrap_or_default(),
            branch: env.string("GITHUB_BRANCH").unwrap_or(repo_defaults.branch),
            codebase_dir: env
                .string("CODEBASE_DIR")
                .map_or(repo_defaults.codebase_dir, PathBuf::from),
            release_tag_pattern: env
                .string("RELEASE_TAG_PATTERN")
                .unwrap_or(repo_defaults.release_tag_pattern),
            repository_url: env.string("REPOSITORY_URL"),
            isolate_runs: env.flag("ISOLATE_RUNS")?.unwrap_or(repo_defaults.isolate_runs),
            worktree_dir: env
                .string("WORKTREE_DIR")
                .map_or(repo_defaults.worktree_dir, PathBuf::from),
            clone_depth,
            git_timeout_secs: env
                .parsed("GIT_TIMEOUT_SECS")?
                .unwrap_or(repo_defaults.git_timeout_secs),
        };

        let notify_defaults = defaults.notification;
        let notification = NotificationConfig {
            slack_bot_token: Secret::new(env.string("SLACK_BOT_TOKEN").unwrap_or_default()),
            slack_team_id: env.string("SLACK_TEAM_ID").unwrap_or_default(),
            feedback_url: env.string("FEEDBACK_URL"),
            user_mapping: env.string("GITHUB_SLACK_USER_MAPPING"),
            integration: env
                .string("NOTIFY_INTEGRATION")
                .unwrap_or(notify_defaults.integration),
            allowed_tools: env
                .string("NOTIFY_ALLOWED_TOOLS")
                .map_or(notify_defaults.allowed_tools, |raw| split_list(&raw)),
        };

        let source_defaults = defaults.error_source;
        let error_source = ErrorSourceConfig {
            project_id: env.string("GCP_PROJECT_ID"),
            service_account_email: env.string("GCP_SERVICE_ACCOUNT_EMAIL"),
            // Keys pasted into env files usually carry literal `\n` sequences
            private_key: env
                .string("GCP_SERVICE_ACCOUNT_PRIVATE_KEY")
                .map(|key| Secret::new(key.replace("\\n", "\n"))),
            api_base_url: env
                .string("GCP_ERROR_REPORTING_URL")
                .unwrap_or(source_defaults.api_base_url),
            token_uri: env.string("GCP_TOKEN_URI").unwrap_or(source_defaults.token_uri),
        };

        let reasoner_defaults = defaults.reasoner;
        let reasoner = ReasonerConfig {
            binary: env.string("CLAUDE_BIN").unwrap_or(reasoner_defaults.binary),
            prompt_dir: env
                .string("PROMPT_DIR")
                .map_or(reasoner_defaults.prompt_dir, PathBuf::from),
            stage_timeout_secs: env
                .parsed("STAGE_TIMEOUT_SECS")?
                .unwrap_or(reasoner_defaults.stage_timeout_secs),
            delivery_timeout_secs: env
                .parsed("DELIVERY_TIMEOUT_SECS")?
                .unwrap_or(reasoner_defaults.delivery_timeout_secs),
            summary_max_attempts: env
                .parsed("SUMMARY_MAX_ATTEMPTS")?
                .unwrap_or(reasoner_defaults.summary_max_attempts),
            analysis_max_attempts: env
                .parsed("ANALYSIS_MAX_ATTEMPTS")?
                .unwrap_or(reasoner_defaults.analysis_max_attempts),
        };

        let dispatch = DispatchConfig {
            max_concurrent: env
                .parsed("MAX_CONCURRENT_PIPELINES")?
                .unwrap_or(defaults.dispatch.max_concurrent),
            max_pending: env
                .parsed("MAX_PENDING_PIPELINES")?
                .unwrap_or(defaults.dispatch.max_pending),
        };

        Ok(Self {
            server,
            environment: env.string("PROJECT").unwrap_or(defaults.environment),
            repository,
            notification,
            error_source,
            reasoner,
            dispatch,
        })
    }

    /// Check required variables and cross-field limits
    ///
    /// # Errors
    /// - `ConfigError::MissingVars` naming every unset required variable
    /// - `ConfigError::Invalid` for inconsistent limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        let present = [
            !self.repository.github_token.is_empty(),
            !self.repository.github_project.trim().is_empty(),
            !self.notification.slack_bot_token.is_empty(),
            !self.notification.slack_team_id.trim().is_empty(),
        ];
        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(var, _)| (*var).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        if self.dispatch.max_concurrent == 0 {
            return Err(invalid("MAX_CONCURRENT_PIPELINES", "must be at least 1"));
        }
        if self.dispatch.max_pending < self.dispatch.max_concurrent {
            return Err(invalid(
                "MAX_PENDING_PIPELINES",
                "must not be below MAX_CONCURRENT_PIPELINES",
            ));
        }
        let attempts = [
            ("SUMMARY_MAX_ATTEMPTS", self.reasoner.summary_max_attempts),
            ("ANALYSIS_MAX_ATTEMPTS", self.reasoner.analysis_max_attempts),
        ];
        for (var, value) in attempts {
            if !(1..=MAX_STAGE_ATTEMPTS).contains(&value) {
                return Err(invalid(var, "must be between 1 and 3"));
            }
        }
        Ok(())
    }

    /// Log format for this environment
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        if self.environment.eq_ignore_ascii_case("DEV") {
            LogFormat::Compact
        } else {
            LogFormat::Json
        }
    }

    /// Shared working copy directory
    #[inline]
    #[must_use]
    pub fn codebase_dir(&self) -> &Path {
        &self.repository.codebase_dir
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, var: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(var)
            .map(|raw| raw.parse().map_err(|e: T::Err| invalid(var, &e.to_string())))
            .transpose()
    }

    fn flag(&self, var: &str) -> Result<Option<bool>, ConfigError> {
        self.string(var)
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, &format!("expected a boolean, got {other:?}"))),
            })
            .transpose()
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
