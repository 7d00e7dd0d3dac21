use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use radar_core::{AnalysisRequest, CoreError, ErrorExt};
use serde::{Deserialize, Serialize};
use tracing::error;

/// `GET /v1/analysis` default and ceiling for the recent-requests listing.
const DEFAULT_LIST_LIMIT: usize = 10;
const MAX_LIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequestBody {
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AcceptedResponse {
    request_id: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    status: &'static str,
}

pub async fn submit_analysis(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequestBody>,
) -> Response {
    let request = AnalysisRequest {
        targets: body.targets,
        keywords: body.keywords,
    };

    match state.orchestrator.submit(request).await {
        Ok(record) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                request_id: record.id,
                status: "accepted",
            }),
        )
            .into_response(),
        Err(submit_error) => error_response(submit_error),
    }
}

pub async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.status.get_request_status(&id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => error_response(CoreError::NotFound {
            resource: format!("analysis request {id}"),
        }),
        Err(lookup_error) => error_response(lookup_error),
    }
}

pub async fn list_recent(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    match state.status.list_recent(limit).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(list_error) => error_response(list_error),
    }
}

pub async fn search_communities(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.unwrap_or_default();
    let suggestions = state.suggester.search(&query).await;
    (StatusCode::OK, Json(suggestions)).into_response()
}

pub async fn live() -> Json<HealthReport> {
    Json(HealthReport { status: "live" })
}

/// Map an error to a status code and a user-facing message. Internal detail
/// goes to the log only.
fn error_response(core_error: CoreError) -> Response {
    let status = match &core_error {
        CoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        CoreError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request handling failed: {}", core_error);
    }
    (
        status,
        Json(ErrorResponse {
            error: core_error.user_friendly_message(),
        }),
    )
        .into_response()
}
