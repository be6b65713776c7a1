//! HTTP front end
//!
//! - `POST /bug-triage/analyze`: submit a triage request
//! - `GET /` and `GET /health`: liveness
//!
//! Client errors come back as `{"detail": ...}`: invalid input is 400, a
//! full worker pool is 503. Anything else is 500.

use crate::intake::TriageIntake;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use triage_core::{AnalysisRequest, Destination, TriageError};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
pub const MAX_BODY_BYTES: u64 = 256 * 1024;

/// Wire form of a triage request
///
/// Flags sent as `null` read as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeBody {
    /// Cloud Error Reporting group to look up
    pub error_reporting_group_id: Option<String>,
    /// Error text supplied directly
    pub error_message: Option<String>,
    /// Slack channel receiving the result
    pub slack_channel_id: Option<String>,
    /// Thread to reply in
    pub slack_thread_id: Option<String>,
    /// Let the summary stage read the thread itself
    pub use_mcp_for_slack_details: Option<bool>,
    /// Validate and acknowledge only
    pub dry_run: Option<bool>,
    /// Extra instruction for the analysis stage
    pub custom_prompt: Option<String>,
}

impl AnalyzeBody {
    /// `dry_run`, with absent or `null` as `false`
    #[inline]
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }
}

impl From<AnalyzeBody> for AnalysisRequest {
    fn from(body: AnalyzeBody) -> Self {
        Self {
            error_group_id: body.error_reporting_group_id,
            error_text: body.error_message,
            destination: Destination::new(body.slack_channel_id, body.slack_thread_id),
            enrich_from_thread: body.use_mcp_for_slack_details.unwrap_or(false),
            dry_run: body.dry_run.unwrap_or(false),
            custom_instruction: body.custom_prompt,
        }
    }
}

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason
    pub detail: String,
}

/// Liveness body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    /// Fixed banner
    pub message: String,
    /// Always `healthy`
    pub status: String,
    /// Current time, RFC 3339
    pub timestamp: String,
}

/// All routes, with rejections recovered into JSON errors
pub fn routes(
    intake: Arc<TriageIntake>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path::end()
        .or(warp::path("health").and(warp::path::end()))
        .unify()
        .and(warp::get())
        .map(|| warp::reply::json(&health_body()));

    let analyze = warp::path!("bug-triage" / "analyze")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<AnalyzeBody>())
        .and(with_intake(intake))
        .and_then(analyze);

    health.or(analyze).recover(recover)
}

fn with_intake(
    intake: Arc<TriageIntake>,
) -> impl Filter<Extract = (Arc<TriageIntake>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&intake))
}

fn health_body() -> HealthBody {
    HealthBody {
        message: "Bug Triage API is running".to_string(),
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }
}

async fn analyze(
    body: AnalyzeBody,
    intake: Arc<TriageIntake>,
) -> Result<warp::reply::Response, Infallible> {
    tracing::info!(
        "Received analysis request (group: {:?}, channel: {:?}, dry_run: {})",
        body.error_reporting_group_id,
        body.slack_channel_id,
        body.is_dry_run()
    );
    let response = match intake.submit(body.into()).await {
        Ok(ack) => warp::reply::json(&ack).into_response(),
        Err(e) => error_response(&e),
    };
    Ok(response)
}

/// Status code for a submission error
#[must_use]
pub fn status_for(error: &TriageError) -> StatusCode {
    match error {
        TriageError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        TriageError::AtCapacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &TriageError) -> warp::reply::Response {
    let status = status_for(error);
    let detail = if error.is_client_facing() {
        error.to_string()
    } else {
        tracing::error!("Request failed: {}", error);
        "Internal server error".to_string()
    };
    json_error(status, detail)
}

fn json_error(status: StatusCode, detail: impl Into<String>) -> warp::reply::Response {
    let body = ErrorBody {
        detail: detail.into(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

async fn recover(rejection: Rejection) -> Result<warp::reply::Response, Infallible> {
    let response = if rejection.is_not_found() {
        json_error(StatusCode::NOT_FOUND, "Not Found")
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        json_error(StatusCode::BAD_REQUEST, format!("invalid request body: {e}"))
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        json_error(StatusCode::LENGTH_REQUIRED, "content-length required")
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        json_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        json_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "expected application/json")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        json_error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        tracing::error!("Unhandled rejection: {:?}", rejection);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(response)
}
