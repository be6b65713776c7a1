//! HTTP routes through `warp::test`

mod common;

use common::{wait_for_completed, HarnessBuilder};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use triage_service::http;
use triage_test_utils::{valid_analysis, ScriptedTool, StaticErrorSource};
use warp::http::StatusCode;

fn body<B: AsRef<[u8]>>(response: &warp::http::Response<B>) -> Value {
    serde_json::from_slice(response.body().as_ref()).unwrap()
}

#[tokio::test]
async fn health_endpoints_answer() {
    let h = HarnessBuilder::new().build();
    let routes = http::routes(h.service.intake.clone());

    for path in ["/", "/health"] {
        let response = warp::test::request().method("GET").path(path).reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body(&response);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "Bug Triage API is running");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn accepted_request_returns_acknowledgement() {
    let h = HarnessBuilder::new()
        .tool(ScriptedTool::new().then_text(&valid_analysis()).then_text("posted"))
        .build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .json(&json!({
            "error_message": "NullPointerException at OrderService.java:42",
            "slack_channel_id": "C042"
        }))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(&response);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["estimated_completion"], "5-10 minutes");
    assert_eq!(
        body["message"],
        "Analysis in progress, results will be posted to Slack"
    );
    assert!(body["analysis_id"].as_str().unwrap().starts_with("triage-"));
    assert!(body["detail"].as_str().unwrap().contains("C042"));

    wait_for_completed(h.service.pool(), 1).await;
    assert_eq!(h.tool.invocation_count(), 2);
}

#[tokio::test]
async fn dry_run_is_acknowledged_without_work() {
    let h = HarnessBuilder::new().build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .json(&json!({"error_message": "boom", "dry_run": true}))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(&response)["message"].as_str().unwrap().ends_with("(dry run)"));
    assert_eq!(h.service.pool().stats().admitted, 0);
}

#[tokio::test]
async fn null_flags_are_accepted() {
    let h = HarnessBuilder::new()
        .tool(ScriptedTool::new().then_text(&valid_analysis()).then_text("posted"))
        .build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .json(&json!({
            "error_message": "boom",
            "slack_channel_id": "C1",
            "dry_run": null,
            "use_mcp_for_slack_details": null
        }))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["status"], "accepted");

    wait_for_completed(h.service.pool(), 1).await;
    assert_eq!(h.tool.invocation_count(), 2);
}

#[tokio::test]
async fn missing_error_input_is_bad_request() {
    let h = HarnessBuilder::new().build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .json(&json!({"slack_channel_id": "C042"}))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(&response)["detail"]
        .as_str()
        .unwrap()
        .contains("error_reporting_group_id"));
}

#[tokio::test]
async fn unknown_group_is_bad_request() {
    let h = HarnessBuilder::new()
        .source(Arc::new(StaticErrorSource::new().with_empty_group("grp-9")))
        .build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .json(&json!({"error_reporting_group_id": "grp-9"}))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let h = HarnessBuilder::new().build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(&response)["detail"].is_string());
}

#[tokio::test]
async fn full_pool_is_service_unavailable() {
    let h = HarnessBuilder::new().dispatch(1, 1).build();
    let (release, hold) = tokio::sync::oneshot::channel::<()>();
    h.service
        .pool()
        .try_spawn(&triage_core::AnalysisId::new("blocker"), move |_| async move {
            let _ = hold.await;
        })
        .unwrap();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/bug-triage/analyze")
        .json(&json!({"error_message": "boom", "slack_channel_id": "C042"}))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body(&response)["detail"].as_str().unwrap().contains("capacity"));
    release.send(()).unwrap();
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let h = HarnessBuilder::new().build();
    let routes = http::routes(h.service.intake.clone());

    let response = warp::test::request()
        .method("GET")
        .path("/bug-triage/unknown")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
