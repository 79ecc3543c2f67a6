//! `/runs` (§6.1, §4.3.1): HeadfulRun lifecycle. `start_session` is
//! folded into `POST /runs/start` so the caller gets back a `Ready`
//! run in one round trip rather than having to separately register
//! then start a session.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use cae_ids::{PlatformKey, RunId};
use cae_protocol::run::HeadfulRun;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub platform_key: String,
    pub tenant_id: String,
    pub storage_state_ref: String,
    pub allowlisted_domain: String,
}

pub async fn start_run(State(state): State<AppState>, Json(body): Json<StartRunRequest>) -> ApiResult<(StatusCode, Json<HeadfulRun>)> {
    let run_id = RunId::new();
    state
        .core
        .register_run(run_id.clone(), PlatformKey::from(body.platform_key.as_str()), body.tenant_id, body.storage_state_ref, body.allowlisted_domain)
        .await?;
    state.core.start_run_session(run_id.clone()).await?;
    let status = state.core.get_run_status(run_id).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunActionRequest {
    Login,
    NavigateToPending,
    ExtractPending { max_pages: u32 },
}

impl From<RunActionRequest> for cae_core::runs::RunAction {
    fn from(value: RunActionRequest) -> Self {
        match value {
            RunActionRequest::Login => cae_core::runs::RunAction::Login,
            RunActionRequest::NavigateToPending => cae_core::runs::RunAction::NavigateToPending,
            RunActionRequest::ExtractPending { max_pages } => cae_core::runs::RunAction::ExtractPending { max_pages },
        }
    }
}

pub async fn execute_action(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<RunActionRequest>,
) -> ApiResult<Json<cae_core::runs::RunActionResult>> {
    let run_id = RunId::parse(&run_id).map_err(|_| ApiError::bad_request("invalid run_id"))?;
    let result = state.core.execute_run_action(run_id, body.into()).await?;
    Ok(Json(result))
}

pub async fn get_status(State(state): State<AppState>, Path(run_id): Path<String>) -> ApiResult<Json<HeadfulRun>> {
    let run_id = RunId::parse(&run_id).map_err(|_| ApiError::bad_request("invalid run_id"))?;
    Ok(Json(state.core.get_run_status(run_id).await?))
}

pub async fn close_run(State(state): State<AppState>, Path(run_id): Path<String>) -> ApiResult<StatusCode> {
    let run_id = RunId::parse(&run_id).map_err(|_| ApiError::bad_request("invalid run_id"))?;
    state.core.close_run(run_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
