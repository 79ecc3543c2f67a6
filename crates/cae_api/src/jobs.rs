//! `/api/jobs` (§6.1, §4.6): Job Queue surface. `POST /api/jobs` and
//! `POST /api/plan/apply` (`crate::plan::apply_plan`) share the same
//! gate-then-enqueue path (`gate_and_build_spec`) since both represent
//! one Apply operation (§4.5.3) entered from two different REST routes.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use cae_ids::{DecisionPackId, JobId, PlanId};
use cae_protocol::job::{ApplyJobSpec, Job};
use cae_protocol::plan::ExecutionResult;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplyJobRequest {
    pub plan_id: String,
    pub decision_pack_id: Option<String>,
    pub item_ids: Vec<String>,
    pub max_uploads: u32,
    pub stop_on_first_error: bool,
    pub rate_limit_seconds: f64,
    pub client_request_id: String,
}

/// Resolves and validates the item list against the sealed plan
/// (`cae_core::apply::gate`), then returns the `ApplyJobSpec` ready to
/// enqueue. Loading the plan goes through `CoreHandle` since plans are
/// Core-owned state; the gate check itself is pure and runs here.
pub async fn gate_and_build_spec(state: &AppState, body: &ApplyJobRequest, real_uploader_header_present: bool) -> ApiResult<ApplyJobSpec> {
    let plan_id = PlanId::parse(&body.plan_id).map_err(|_| ApiError::bad_request("invalid plan_id"))?;
    let decision_pack_id = body
        .decision_pack_id
        .as_deref()
        .map(DecisionPackId::parse)
        .transpose()
        .map_err(|_| ApiError::bad_request("invalid decision_pack_id"))?;

    let plan = match &decision_pack_id {
        Some(pack_id) => state.core.get_decision_pack_plan(plan_id.clone(), pack_id.clone()).await?,
        None => state.core.get_plan(plan_id.clone()).await?,
    };

    let request = cae_core::apply::ApplyRequest {
        plan_id: plan_id.clone(),
        decision_pack_id: decision_pack_id.clone(),
        item_ids: body.item_ids.clone(),
        max_uploads: body.max_uploads,
        stop_on_first_error: body.stop_on_first_error,
        rate_limit_seconds: body.rate_limit_seconds,
        real_uploader_header_present,
    };
    let resolved_items = cae_core::apply::gate(&request, &plan, state.options.operator_mode, state.options.max_uploads_hard_cap)?;

    Ok(ApplyJobSpec {
        plan_id,
        decision_pack_id,
        item_ids: resolved_items,
        max_uploads: body.max_uploads,
        stop_on_first_error: body.stop_on_first_error,
        rate_limit_seconds: body.rate_limit_seconds,
        client_request_id: body.client_request_id.clone(),
    })
}

pub fn real_uploader_header(headers: &HeaderMap) -> bool {
    headers.get("X-USE-REAL-UPLOADER").and_then(|v| v.to_str().ok()) == Some("1")
}

pub async fn create_job(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ApplyJobRequest>) -> ApiResult<(StatusCode, Json<Job>)> {
    if let Some(cached) = state.idempotency.lookup(&body.client_request_id)? {
        return Ok((StatusCode::OK, Json(cached_as_job(&body, cached))));
    }
    let spec = gate_and_build_spec(&state, &body, real_uploader_header(&headers)).await?;
    let job = state.core.enqueue_apply_job(spec).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Idempotent replay of a prior Apply has no job record to show (the
/// original job has long since been garbage-collected or was never a
/// job at all, if the original call came through `/api/plan/apply`);
/// synthesize a terminal view so pollers see a consistent shape.
fn cached_as_job(body: &ApplyJobRequest, result: ExecutionResult) -> Job {
    let spec = ApplyJobSpec {
        plan_id: PlanId::parse(&body.plan_id).unwrap_or_else(|_| PlanId::new()),
        decision_pack_id: body.decision_pack_id.as_deref().and_then(|s| DecisionPackId::parse(s).ok()),
        item_ids: body.item_ids.clone(),
        max_uploads: body.max_uploads,
        stop_on_first_error: body.stop_on_first_error,
        rate_limit_seconds: body.rate_limit_seconds,
        client_request_id: body.client_request_id.clone(),
    };
    let now = chrono::Utc::now();
    Job {
        job_id: JobId::new(),
        spec,
        state: cae_protocol::job::JobState::Succeeded {
            started_at: now,
            completed_at: now,
            result,
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
}

pub async fn list_jobs(State(state): State<AppState>, Query(q): Query<JobsQuery>) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(state.core.list_jobs(q.status).await?))
}

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<Job>> {
    let job_id = JobId::parse(&job_id).map_err(|_| ApiError::bad_request("invalid job_id"))?;
    Ok(Json(state.core.get_job(job_id).await?))
}

pub async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<StatusCode> {
    let job_id = JobId::parse(&job_id).map_err(|_| ApiError::bad_request("invalid job_id"))?;
    state.core.cancel_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Polls a just-enqueued job to completion for the synchronous
/// `/api/plan/apply` entry point. Bounded by the job's own rate limit
/// and item count; callers needing true async behavior should use
/// `/api/jobs` instead and poll `GET /api/jobs/{id}` themselves.
pub async fn poll_until_terminal(state: &AppState, job_id: JobId) -> ApiResult<ExecutionResult> {
    loop {
        let job = state.core.get_job(job_id.clone()).await?;
        match job.state {
            cae_protocol::job::JobState::Succeeded { result, .. } => return Ok(result),
            cae_protocol::job::JobState::Failed { error, .. } => return Err(ApiError::bad_request(error)),
            cae_protocol::job::JobState::Canceled { .. } => return Err(ApiError::bad_request("job was canceled")),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}
