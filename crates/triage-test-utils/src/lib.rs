//! Testing utilities for the triage workspace
//!
//! Scripted stand-ins for every external collaborator, plus fixtures.
//! Only usable from `tests/` directories: in-crate unit tests would link a
//! second copy of the crate under test.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use triage_core::{
    CommandOutput, CommandRunner, CommandSpec, ProcessError, Secret, TriageConfig,
    REQUIRED_FIELDS,
};
use triage_errorsource::{ErrorSource, ErrorSourceError};
use triage_reasoner::{
    IntegrationStatus, InvocationOptions, OutputMode, ReasoningTool, ToolError, ToolOutput,
};

// ---------------------------------------------------------------------------
// Reasoning tool
// ---------------------------------------------------------------------------

/// Canned reply of a [`ScriptedTool`]
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(ToolOutput),
    Timeout,
    SpawnFailure,
}

/// One recorded tool invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub prompt: String,
    pub options: InvocationOptions,
}

/// Reasoning tool answering from a queue; an empty queue answers `""`
#[derive(Debug, Default)]
pub struct ScriptedTool {
    replies: Mutex<VecDeque<ScriptedReply>>,
    invocations: Mutex<Vec<Invocation>>,
    integration: Mutex<Option<IntegrationStatus>>,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then(ScriptedReply::Output(ToolOutput::text(text)))
    }

    pub fn then_failed_exit(self, text: &str, stderr: &str) -> Self {
        self.then(ScriptedReply::Output(ToolOutput {
            text: text.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(1),
            transcript: Vec::new(),
        }))
    }

    pub fn then_timeout(self) -> Self {
        self.then(ScriptedReply::Timeout)
    }

    pub fn then_spawn_failure(self) -> Self {
        self.then(ScriptedReply::SpawnFailure)
    }

    pub fn then(self, reply: ScriptedReply) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn with_integration(self, status: IntegrationStatus) -> Self {
        *self.integration.lock() = Some(status);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn count_mode(&self, mode: OutputMode) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|i| i.options.mode == mode)
            .count()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl ReasoningTool for ScriptedTool {
    async fn invoke(
        &self,
        prompt: &str,
        options: &InvocationOptions,
    ) -> Result<ToolOutput, ToolError> {
        self.invocations.lock().push(Invocation {
            prompt: prompt.to_string(),
            options: options.clone(),
        });
        let reply = self.replies.lock().pop_front();
        match reply {
            None => Ok(ToolOutput::text("")),
            Some(ScriptedReply::Output(output)) => Ok(output),
            Some(ScriptedReply::Timeout) => Err(ToolError::Process(ProcessError::Timeout {
                program: "claude".to_string(),
                after: options.timeout.unwrap_or(Duration::ZERO),
            })),
            Some(ScriptedReply::SpawnFailure) => Err(ToolError::Process(ProcessError::Spawn {
                program: "claude".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "claude not found"),
            })),
        }
    }

    async fn integration_status(&self, _name: &str) -> Result<IntegrationStatus, ToolError> {
        Ok(self
            .integration
            .lock()
            .clone()
            .unwrap_or(IntegrationStatus::Connected))
    }
}

// ---------------------------------------------------------------------------
// Command runner
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    // `None` scripts a timeout; the last reply repeats
    replies: VecDeque<Option<CommandOutput>>,
}

/// Command runner answering by argument prefix
///
/// The longest matching prefix wins. Unmatched commands succeed with empty
/// output. Every command is recorded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, prefix: &[&str], output: CommandOutput) -> Self {
        self.push(prefix, Some(output));
        self
    }

    pub fn on_stdout(self, prefix: &[&str], stdout: &str) -> Self {
        self.on(prefix, CommandOutput::ok(stdout))
    }

    pub fn on_failure(self, prefix: &[&str], stderr: &str) -> Self {
        self.on(prefix, CommandOutput::failed(128, stderr))
    }

    pub fn on_timeout(self, prefix: &[&str]) -> Self {
        self.push(prefix, None);
        self
    }

    fn push(&self, prefix: &[&str], reply: Option<CommandOutput>) {
        let prefix: Vec<String> = prefix.iter().map(ToString::to_string).collect();
        let mut rules = self.rules.lock();
        match rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(Rule {
                prefix,
                replies: VecDeque::from([reply]),
            }),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    pub fn arg_lists(&self) -> Vec<Vec<String>> {
        self.calls.lock().iter().map(|c| c.args.clone()).collect()
    }

    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.args_start_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().push(spec.clone());

        let mut rules = self.rules.lock();
        let rule = rules
            .iter_mut()
            .filter(|r| {
                let prefix: Vec<&str> = r.prefix.iter().map(String::as_str).collect();
                spec.args_start_with(&prefix)
            })
            .max_by_key(|r| r.prefix.len());

        let reply = match rule {
            None => Some(CommandOutput::ok("")),
            Some(rule) if rule.replies.len() > 1 => rule.replies.pop_front().flatten(),
            Some(rule) => rule.replies.front().cloned().flatten(),
        };
        reply.ok_or_else(|| ProcessError::Timeout {
            program: spec.program.clone(),
            after: spec.timeout.unwrap_or(Duration::ZERO),
        })
    }
}

// ---------------------------------------------------------------------------
// Error source
// ---------------------------------------------------------------------------

/// Error source backed by a fixed map
#[derive(Debug, Default)]
pub struct StaticErrorSource {
    groups: HashMap<String, Option<String>>,
    failing: bool,
    lookups: Mutex<Vec<String>>,
}

impl StaticErrorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group_id: &str, message: &str) -> Self {
        self.groups
            .insert(group_id.to_string(), Some(message.to_string()));
        self
    }

    pub fn with_empty_group(mut self, group_id: &str) -> Self {
        self.groups.insert(group_id.to_string(), None);
        self
    }

    /// Every lookup fails with an auth error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl ErrorSource for StaticErrorSource {
    async fn latest_message(&self, group_id: &str) -> Result<Option<String>, ErrorSourceError> {
        self.lookups.lock().push(group_id.to_string());
        if self.failing {
            return Err(ErrorSourceError::MissingCredentials);
        }
        Ok(self.groups.get(group_id).cloned().flatten())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Root-cause analysis carrying every required field
pub fn valid_analysis() -> String {
    json!({
        "root_cause_analysis": "order.customer is null when the cart is restored from cache",
        "root_cause_file_codebase": "src/main/java/shop/OrderService.java:42",
        "suspect_commit": "9f2c1e4",
        "suspect_commit_author": "dana",
        "recommended_person": "<@U024BE7LH>",
        "recommended_reason": "authored the cache restore path",
        "suggestion": "null-check customer before dereferencing"
    })
    .to_string()
}

/// Substantial prose that lacks every required field marker
pub const MALFORMED_PROSE: &str =
    "The order service dereferences a null customer after cache restore.";

/// Issue summary that passes Stage A validation
pub fn valid_summary() -> String {
    json!({
        "issue_summary": "Checkout fails for restored carts",
        "problem_description": "NullPointerException at OrderService.java:42",
        "technical_observations": ["only carts restored from cache"]
    })
    .to_string()
}

/// Analysis with `field` (and any marker containing it) removed
pub fn analysis_without(field: &str) -> String {
    let Value::Object(map) = serde_json::from_str::<Value>(&valid_analysis()).unwrap() else {
        unreachable!("fixture is an object")
    };
    let kept: serde_json::Map<String, Value> = map
        .into_iter()
        .filter(|(key, _)| !key.contains(field))
        .collect();
    Value::Object(kept).to_string()
}

pub fn system_line() -> String {
    json!({"type": "system", "subtype": "init", "session_id": "s-1"}).to_string()
}

pub fn assistant_text_line(text: &str) -> String {
    json!({"type": "assistant", "message": {"content": [{"type": "text", "text": text}]}})
        .to_string()
}

pub fn tool_use_line(name: &str, input: Value) -> String {
    json!({"type": "assistant", "message": {"content": [
        {"type": "tool_use", "id": "toolu_1", "name": name, "input": input}
    ]}})
    .to_string()
}

pub fn result_line(result: &str) -> String {
    json!({"type": "result", "subtype": "success", "is_error": false, "result": result})
        .to_string()
}

/// Full stream-json stdout ending in a result event carrying `result`
pub fn event_stream(result: &str) -> String {
    [
        system_line(),
        assistant_text_line("Investigating the stack trace"),
        tool_use_line("Grep", json!({"pattern": "OrderService", "path": "src"})),
        result_line(result),
    ]
    .join("\n")
}

/// Configuration with every required variable set
pub fn test_config() -> TriageConfig {
    let mut config = TriageConfig::default();
    config.repository.github_token = Secret::new("ghp_test");
    config.repository.github_project = "acme/shop".to_string();
    config.notification.slack_bot_token = Secret::new("xoxb-test");
    config.notification.slack_team_id = "T0001".to_string();
    config.notification.feedback_url = Some("https://feedback.example/triage".to_string());
    config.notification.user_mapping = Some("dana=U024BE7LH".to_string());
    config
}

/// Whether `text` carries every required marker
pub fn has_all_fields(text: &str) -> bool {
    REQUIRED_FIELDS.iter().all(|f| text.contains(f))
}
