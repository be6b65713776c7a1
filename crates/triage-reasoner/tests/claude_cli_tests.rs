//! `ClaudeCli` against a scripted command runner

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use triage_core::CommandOutput;
use triage_reasoner::{ClaudeCli, IntegrationStatus, InvocationOptions, ReasoningTool, ToolError};
use triage_test_utils::{
    event_stream, result_line, system_line, tool_use_line, valid_analysis, ScriptedRunner,
};

fn cli(runner: &Arc<ScriptedRunner>) -> ClaudeCli {
    ClaudeCli::new(runner.clone(), "claude")
}

#[tokio::test]
async fn text_mode_returns_trimmed_stdout() {
    let runner = Arc::new(ScriptedRunner::new().on_stdout(&["-p"], "  summary text\n"));

    let output = cli(&runner)
        .invoke("summarize", &InvocationOptions::text())
        .await
        .unwrap();

    assert_eq!(output.text, "summary text");
    assert!(output.transcript.is_empty());
    assert_eq!(runner.arg_lists(), vec![vec!["-p", "summarize"]]);
}

#[tokio::test]
async fn event_stream_extracts_final_result() {
    let analysis = valid_analysis();
    let runner = Arc::new(
        ScriptedRunner::new().on_stdout(&["--add-dir"], &event_stream(&analysis)),
    );

    let output = cli(&runner)
        .invoke("analyze", &InvocationOptions::event_stream("/work/run-1"))
        .await
        .unwrap();

    assert_eq!(output.text, analysis);
    assert_eq!(
        output.transcript,
        vec![
            "Investigating the stack trace".to_string(),
            "Grep(OrderService in src)".to_string(),
            format!("result:{analysis}"),
        ]
    );
}

#[tokio::test]
async fn event_stream_without_result_yields_empty_candidate() {
    let stdout = [
        system_line(),
        tool_use_line("Read", json!({"file_path": "src/Order.java"})),
    ]
    .join("\n");
    let runner = Arc::new(ScriptedRunner::new().on_stdout(&["--add-dir"], &stdout));

    let output = cli(&runner)
        .invoke("analyze", &InvocationOptions::event_stream("/work"))
        .await
        .unwrap();

    assert_eq!(output.text, "");
    assert_eq!(output.transcript, vec!["Read(src/Order.java)"]);
}

#[tokio::test]
async fn non_zero_exit_still_returns_output() {
    let runner = Arc::new(ScriptedRunner::new().on(
        &["--add-dir"],
        CommandOutput {
            status: Some(1),
            stdout: result_line("API Error: Connection error"),
            stderr: "upstream failure".to_string(),
        },
    ));

    let output = cli(&runner)
        .invoke("analyze", &InvocationOptions::event_stream("/work"))
        .await
        .unwrap();

    assert_eq!(output.text, "API Error: Connection error");
    assert_eq!(output.exit_code, Some(1));
    assert_eq!(output.stderr, "upstream failure");
    assert!(!output.succeeded());
}

#[tokio::test]
async fn timeout_is_a_tool_error() {
    let runner = Arc::new(ScriptedRunner::new().on_timeout(&["-p"]));
    let options = InvocationOptions::text().with_timeout(Duration::from_secs(5));

    let err = cli(&runner).invoke("x", &options).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(runner.calls()[0].timeout, Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn empty_prompt_is_rejected_without_spawning() {
    let runner = Arc::new(ScriptedRunner::new());

    let err = cli(&runner)
        .invoke("   ", &InvocationOptions::text())
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::EmptyPrompt));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn integration_status_reads_mcp_get() {
    let runner = Arc::new(ScriptedRunner::new().on_stdout(
        &["mcp", "get", "slack"],
        "slack:\n  Scope: Local config\n  Status: ✓ Connected\n  Type: stdio\n",
    ));

    let status = cli(&runner).integration_status("slack").await.unwrap();

    assert_eq!(status, IntegrationStatus::Connected);
}

#[tokio::test]
async fn integration_status_reports_failures() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on_stdout(&["mcp", "get", "slack"], "slack:\n  Status: ✗ Failed to connect\n")
            .on_failure(&["mcp", "get", "jira"], "No MCP server found with name: jira"),
    );
    let cli = cli(&runner);

    assert!(!cli.integration_status("slack").await.unwrap().is_connected());
    assert_eq!(
        cli.integration_status("jira").await.unwrap(),
        IntegrationStatus::NotConnected("No MCP server found with name: jira".to_string())
    );
}
