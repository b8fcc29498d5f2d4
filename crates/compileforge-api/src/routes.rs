use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use compileforge_core::{CompilationJob, CompilationRequest, CompilationResult, Environment, WorkerStats};

use crate::state::AppState;

/// Wraps `compileforge_core::Error` so this crate can implement
/// `IntoResponse` for it without running into the orphan rule.
pub struct ApiError(compileforge_core::Error);

impl From<compileforge_core::Error> for ApiError {
    fn from(err: compileforge_core::Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": self.0.to_string(),
            "category": self.0.category(),
        }));
        (status, body).into_response()
    }
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/compile", axum::routing::post(submit_compile))
        .route("/api/v1/compile/:job_id", axum::routing::get(fetch_compile))
        .route("/api/v1/environments", axum::routing::get(list_environments))
        .route("/api/v1/workers/stats", axum::routing::get(workers_stats))
        .route("/health", axum::routing::get(health))
}

#[derive(Serialize)]
struct SubmitResponse {
    job_id: Uuid,
}

async fn submit_compile(
    State(state): State<AppState>,
    Json(request): Json<CompilationRequest>,
) -> Result<Response, ApiError> {
    let (job_id, accepted) = state.lifecycle.submit(request).await?;
    if accepted {
        Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })).into_response())
    } else {
        Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "job_id": job_id, "error": "service overloaded" })),
        )
            .into_response())
    }
}

#[derive(Serialize, Deserialize)]
struct FetchResponse {
    job: CompilationJob,
    result: Option<CompilationResult>,
}

async fn fetch_compile(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (job, result) = state.lifecycle.fetch(job_id).await?;
    match job {
        Some(job) => Ok((StatusCode::OK, Json(FetchResponse { job, result })).into_response()),
        None => Err(compileforge_core::Error::not_found(format!("job {job_id} not found")).into()),
    }
}

async fn list_environments(State(state): State<AppState>) -> Json<Vec<Environment>> {
    Json(state.lifecycle.supported_environments().to_vec())
}

async fn workers_stats(State(state): State<AppState>) -> Json<WorkerStats> {
    Json(state.lifecycle.pool_stats())
}

async fn health() -> &'static str {
    "OK"
}
