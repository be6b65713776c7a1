//! Cloud Error Reporting client against a mock API

use pretty_assertions::assert_eq;
use serde_json::json;
use triage_core::{ErrorSourceConfig, Secret};
use triage_errorsource::{CloudErrorReporting, ErrorSource, ErrorSourceError};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/service_account_key.pem");

fn config(server: &MockServer) -> ErrorSourceConfig {
    ErrorSourceConfig {
        project_id: Some("shop-prod".to_string()),
        service_account_email: Some("triage@shop-prod.iam.gserviceaccount.com".to_string()),
        private_key: Some(Secret::new(TEST_KEY)),
        api_base_url: format!("{}/v1beta1", server.uri()),
        token_uri: format!("{}/token", server.uri()),
    }
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant-type%3Ajwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.test-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn returns_first_event_message() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1beta1/projects/shop-prod/events"))
        .and(query_param("groupId", "CJ7g0a"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorEvents": [
                {"message": "NullPointerException at OrderService.java:42"},
                {"message": "older event"}
            ]
        })))
        .mount(&server)
        .await;

    let client = CloudErrorReporting::new(config(&server)).unwrap();
    let message = client.latest_message("CJ7g0a").await.unwrap();

    assert_eq!(
        message.as_deref(),
        Some("NullPointerException at OrderService.java:42")
    );
}

#[tokio::test]
async fn group_without_events_resolves_to_none() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1beta1/projects/shop-prod/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = CloudErrorReporting::new(config(&server)).unwrap();
    assert_eq!(client.latest_message("empty-group").await.unwrap(), None);
}

#[tokio::test]
async fn access_token_is_reused_across_lookups() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1beta1/projects/shop-prod/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorEvents": [{"message": "boom"}]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = CloudErrorReporting::new(config(&server)).unwrap();
    for _ in 0..3 {
        assert_eq!(client.latest_message("g").await.unwrap().as_deref(), Some("boom"));
    }
}

#[tokio::test]
async fn rejected_token_exchange_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let client = CloudErrorReporting::new(config(&server)).unwrap();
    let err = client.latest_message("g").await.unwrap_err();

    assert!(matches!(err, ErrorSourceError::TokenExchange(_)));
    assert!(err.is_auth());
}

#[tokio::test]
async fn api_failure_surfaces_status() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1beta1/projects/shop-prod/events"))
        .respond_with(ResponseTemplate::new(404).set_body_string("group not found"))
        .mount(&server)
        .await;

    let client = CloudErrorReporting::new(config(&server)).unwrap();
    match client.latest_message("missing").await {
        Err(ErrorSourceError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "group not found");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_response_evicts_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/v1beta1/projects/shop-prod/events"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = CloudErrorReporting::new(config(&server)).unwrap();
    assert!(client.latest_message("g").await.unwrap_err().is_auth());
    assert!(client.latest_message("g").await.unwrap_err().is_auth());
}
