//! HTTP surface: session create/status/abort routes plus, when swarm is
//! enabled, the full `/plugins/swarm/*` router merged in (spec.md §6's wire
//! protocol table). Mirrors the teacher's `runtime/src/api/routes.rs`
//! handler convention: `State<Arc<TaskRuntime>>` extractor, `Json` in/out,
//! errors mapped to `(StatusCode, Json<ErrorBody>)`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fulcrum_common::SessionId;
use fulcrum_kernel::{Limits, SessionMode, SessionStatus};
use fulcrum_permission::PolicyProfile;
use serde::{Deserialize, Serialize};

use crate::composition::TaskRuntime;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(err: crate::error::RuntimeError) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: err.to_string() }))
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    task: String,
    #[serde(default)]
    mode: Option<SessionMode>,
    #[serde(default)]
    limits: Option<Limits>,
    #[serde(default)]
    policy: Option<PolicyProfile>,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: SessionId,
}

async fn create_session(
    State(runtime): State<Arc<TaskRuntime>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, (StatusCode, Json<ErrorBody>)> {
    let session_id = runtime
        .create_session(req.task, req.mode.unwrap_or(SessionMode::Real), req.limits.unwrap_or_default(), req.policy.unwrap_or_default())
        .await
        .map_err(error_response)?;
    Ok(Json(CreateSessionResponse { session_id }))
}

#[derive(Serialize)]
struct SessionStatusResponse {
    status: SessionStatus,
}

async fn session_status(
    State(runtime): State<Arc<TaskRuntime>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionStatusResponse>, (StatusCode, Json<ErrorBody>)> {
    let status = runtime.kernel.session_status(session_id).await.map_err(|err| error_response(err.into()))?;
    Ok(Json(SessionStatusResponse { status }))
}

async fn run_session(
    State(runtime): State<Arc<TaskRuntime>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionStatusResponse>, (StatusCode, Json<ErrorBody>)> {
    let status = runtime.run_session(session_id).await.map_err(error_response)?;
    Ok(Json(SessionStatusResponse { status }))
}

async fn abort_session(
    State(runtime): State<Arc<TaskRuntime>>,
    Path(session_id): Path<SessionId>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    runtime.kernel.abort(session_id).await.map_err(|err| error_response(err.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(runtime: Arc<TaskRuntime>) -> Router {
    let session_routes = Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", get(session_status))
        .route("/sessions/:session_id/run", post(run_session))
        .route("/sessions/:session_id/abort", post(abort_session))
        .with_state(runtime.clone());

    match &runtime.swarm {
        Some(swarm) => session_routes.merge(fulcrum_swarm::router(swarm.clone())),
        None => session_routes,
    }
}
