//! Orchestrator behavior against a scripted reasoning tool

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use triage_analysis::{AnalysisInput, AnalysisOrchestrator, AnalysisSettings};
use triage_core::{AnalysisStage, ThreadContext, TriageError};
use triage_reasoner::OutputMode;
use triage_test_utils::{
    analysis_without, has_all_fields, valid_analysis, valid_summary, ScriptedTool,
    MALFORMED_PROSE,
};

fn orchestrator(tool: &Arc<ScriptedTool>) -> AnalysisOrchestrator {
    let settings = AnalysisSettings {
        summary_max_attempts: 3,
        analysis_max_attempts: 3,
        stage_timeout: Duration::from_secs(30),
        prompt_dir: "prompts".into(),
    };
    AnalysisOrchestrator::new(tool.clone(), settings)
}

fn input() -> AnalysisInput {
    AnalysisInput::new("NullPointerException at OrderService.java:42", "/work/run-1")
}

fn enriched_input(text: &str) -> AnalysisInput {
    AnalysisInput::new(text, "/work/run-1").with_thread(ThreadContext {
        enrich: true,
        channel_id: Some("C042".into()),
        thread_id: Some("1700000000.000100".into()),
    })
}

#[tokio::test]
async fn valid_first_attempt_runs_stage_b_once() {
    let tool = Arc::new(ScriptedTool::new().then_text(&valid_analysis()));

    let analysis = orchestrator(&tool).analyze(&input()).await.unwrap();

    assert_eq!(analysis.as_str(), valid_analysis());
    assert_eq!(tool.invocation_count(), 1);

    let call = &tool.invocations()[0];
    assert_eq!(call.options.mode, OutputMode::EventStream);
    assert_eq!(call.options.working_dir.as_deref(), Some(Path::new("/work/run-1")));
    assert_eq!(call.options.timeout, Some(Duration::from_secs(30)));
    assert!(call.prompt.contains("NullPointerException at OrderService.java:42"));
    assert!(call.prompt.contains("prompts/analysis_prompt.md"));
}

#[tokio::test]
async fn connection_errors_are_retried_without_repair() {
    let tool = Arc::new(
        ScriptedTool::new()
            .then_text("Connection error")
            .then_text("Connection error")
            .then_text(&valid_analysis()),
    );

    let analysis = orchestrator(&tool).analyze(&input()).await.unwrap();

    assert!(has_all_fields(analysis.as_str()));
    assert_eq!(tool.count_mode(OutputMode::EventStream), 3);
    assert_eq!(tool.count_mode(OutputMode::Text), 0);
}

#[tokio::test]
async fn successful_repair_short_circuits_the_attempt_loop() {
    let malformed = analysis_without("suspect_commit");
    assert!(malformed.chars().count() >= 30);
    let tool = Arc::new(
        ScriptedTool::new()
            .then_text(&malformed)
            .then_text(&valid_analysis())
            .then_text("never consumed"),
    );

    let analysis = orchestrator(&tool).analyze(&input()).await.unwrap();

    assert_eq!(analysis.as_str(), valid_analysis());
    assert_eq!(tool.count_mode(OutputMode::EventStream), 1);
    assert_eq!(tool.count_mode(OutputMode::Text), 1);
    assert_eq!(tool.remaining_replies(), 1);

    let repair = &tool.invocations()[1];
    assert!(repair.prompt.contains(&malformed));
    assert!(repair.options.allowed_tools.is_empty());
}

#[tokio::test]
async fn failed_repair_moves_to_a_fresh_attempt() {
    let tool = Arc::new(
        ScriptedTool::new()
            .then_text(MALFORMED_PROSE)
            .then_text(MALFORMED_PROSE)
            .then_text(&valid_analysis()),
    );

    orchestrator(&tool).analyze(&input()).await.unwrap();

    let modes: Vec<OutputMode> = tool.invocations().iter().map(|i| i.options.mode).collect();
    assert_eq!(
        modes,
        vec![OutputMode::EventStream, OutputMode::Text, OutputMode::EventStream]
    );
}

#[tokio::test]
async fn exhaustion_returns_no_partial_result() {
    let tool = Arc::new(
        ScriptedTool::new()
            .then_text("API Error: 529 overloaded")
            .then_text("too short")
            .then_text("Network error"),
    );

    let err = orchestrator(&tool).analyze(&input()).await.unwrap_err();

    assert!(matches!(
        err,
        TriageError::AnalysisExhausted {
            stage: AnalysisStage::RootCause,
            attempts: 3
        }
    ));
    assert_eq!(tool.invocation_count(), 3);
}

#[tokio::test]
async fn every_attempt_malformed_costs_one_repair_each() {
    let tool = Arc::new((0..6).fold(ScriptedTool::new(), |t, _| t.then_text(MALFORMED_PROSE)));

    let err = orchestrator(&tool).analyze(&input()).await.unwrap_err();

    assert!(matches!(err, TriageError::AnalysisExhausted { .. }));
    assert_eq!(tool.count_mode(OutputMode::EventStream), 3);
    assert_eq!(tool.count_mode(OutputMode::Text), 3);
}

#[tokio::test]
async fn tool_errors_consume_attempts() {
    let tool = Arc::new(
        ScriptedTool::new()
            .then_timeout()
            .then_spawn_failure()
            .then_text(&valid_analysis()),
    );

    let analysis = orchestrator(&tool).analyze(&input()).await;

    assert!(analysis.is_ok());
    assert_eq!(tool.invocation_count(), 3);
}

#[tokio::test]
async fn custom_instruction_is_appended_to_stage_b_prompt() {
    let tool = Arc::new(ScriptedTool::new().then_text(&valid_analysis()));
    let input = input().with_custom_instruction(Some("Check the payment module first".into()));

    orchestrator(&tool).analyze(&input).await.unwrap();

    assert!(tool.invocations()[0]
        .prompt
        .ends_with("Check the payment module first"));
}

#[tokio::test]
async fn stage_a_is_skipped_without_both_references() {
    let tool = Arc::new(ScriptedTool::new().then_text(&valid_analysis()));
    let input = input().with_thread(ThreadContext {
        enrich: true,
        channel_id: Some("C042".into()),
        thread_id: None,
    });

    orchestrator(&tool).analyze(&input).await.unwrap();

    assert_eq!(tool.count_mode(OutputMode::Text), 0);
}

#[tokio::test]
async fn summary_replaces_error_text_for_stage_b() {
    let tool = Arc::new(
        ScriptedTool::new()
            .then_text("Network hiccup, no summary")
            .then_text(&valid_summary())
            .then_text(&valid_analysis()),
    );

    orchestrator(&tool)
        .analyze(&enriched_input("raw thread message 7f3a"))
        .await
        .unwrap();

    let calls = tool.invocations();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].options.mode, OutputMode::Text);
    assert!(calls[0].prompt.contains("C042"));
    assert!(calls[0].prompt.contains("1700000000.000100"));
    assert!(calls[0].prompt.contains("raw thread message 7f3a"));

    assert_eq!(calls[2].options.mode, OutputMode::EventStream);
    assert!(calls[2].prompt.contains("issue_summary"));
    assert!(!calls[2].prompt.contains("raw thread message 7f3a"));
}

#[tokio::test]
async fn exhausted_summary_stops_before_stage_b() {
    let tool = Arc::new(
        ScriptedTool::new()
            .then_text("short")
            .then_timeout()
            .then_text("a long reply that mentions none of the expected keys"),
    );

    let err = orchestrator(&tool)
        .analyze(&enriched_input("boom"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TriageError::AnalysisExhausted {
            stage: AnalysisStage::IssueSummary,
            attempts: 3
        }
    ));
    assert_eq!(tool.count_mode(OutputMode::EventStream), 0);
}

#[derive(Debug, Clone, Copy)]
enum Reply {
    Valid,
    Connection,
    Short,
    Malformed,
}

fn reply_text(reply: Reply) -> String {
    match reply {
        Reply::Valid => valid_analysis(),
        Reply::Connection => "Connection refused".to_string(),
        Reply::Short => "no idea".to_string(),
        Reply::Malformed => MALFORMED_PROSE.to_string(),
    }
}

fn reply_strategy() -> impl Strategy<Value = Reply> {
    prop_oneof![
        Just(Reply::Valid),
        Just(Reply::Connection),
        Just(Reply::Short),
        Just(Reply::Malformed),
    ]
}

proptest! {
    #[test]
    fn prop_attempt_and_repair_bounds(replies in proptest::collection::vec(reply_strategy(), 0..10)) {
        let tool = replies
            .iter()
            .fold(ScriptedTool::new(), |tool, r| tool.then_text(&reply_text(*r)));
        let tool = Arc::new(tool);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = runtime.block_on(orchestrator(&tool).analyze(&input()));

        let stream = tool.count_mode(OutputMode::EventStream);
        let text = tool.count_mode(OutputMode::Text);
        prop_assert!(stream <= 3);
        prop_assert!(text <= stream);
        match result {
            Ok(analysis) => prop_assert!(has_all_fields(analysis.as_str())),
            Err(e) => {
                let exhausted = matches!(e, TriageError::AnalysisExhausted { .. });
                prop_assert!(exhausted);
                prop_assert_eq!(stream, 3);
            }
        }
    }
}
