//! `/api/plan` (§6.1): plan construction and Decision Pack application.
//! Both `build_readonly` and `build_auto_upload_plan` wrap the same
//! `CoreHandle::build_plan` call — a plan is always sealed as soon as
//! it's built (§4.5.1), so there is no separate "preview, don't persist"
//! code path at the Core layer; the two endpoints exist for UI clarity
//! over the same operation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use cae_ids::{DecisionPackId, PlanId, PlatformKey, RunId};
use cae_protocol::decision_pack::DecisionPack;
use cae_protocol::matching::PendingRequirement;
use cae_protocol::plan::Plan;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BuildPlanRequest {
    pub run_id: String,
    pub platform_key: String,
    pub coord: Option<String>,
    pub company_key: Option<String>,
    pub person_key: Option<String>,
    pub only_target: Option<String>,
    pub limit: Option<usize>,
    pub items: Vec<PendingRequirement>,
}

async fn build_plan_common(state: &AppState, body: BuildPlanRequest) -> ApiResult<Plan> {
    let plan_id = PlanId::new();
    let request = cae_core::plan::PlanBuildRequest {
        run_id: RunId::parse(&body.run_id).map_err(|_| ApiError::bad_request("invalid run_id"))?,
        platform_key: PlatformKey::from(body.platform_key.as_str()),
        coord: body.coord,
        company_key: body.company_key,
        person_key: body.person_key,
        only_target: body.only_target,
        limit: body.limit,
        today: chrono::Utc::now().date_naive(),
    };
    Ok(state.core.build_plan(plan_id, request, body.items).await?)
}

pub async fn build_readonly(State(state): State<AppState>, Json(body): Json<BuildPlanRequest>) -> ApiResult<(StatusCode, Json<Plan>)> {
    Ok((StatusCode::CREATED, Json(build_plan_common(&state, body).await?)))
}

pub async fn build_auto_upload_plan(State(state): State<AppState>, Json(body): Json<BuildPlanRequest>) -> ApiResult<(StatusCode, Json<Plan>)> {
    Ok((StatusCode::CREATED, Json(build_plan_common(&state, body).await?)))
}

pub async fn get_plan(State(state): State<AppState>, Path(plan_id): Path<String>) -> ApiResult<Json<Plan>> {
    let plan_id = PlanId::parse(&plan_id).map_err(|_| ApiError::bad_request("invalid plan_id"))?;
    Ok(Json(state.core.get_plan(plan_id).await?))
}

pub async fn create_decision_pack(State(state): State<AppState>, Path(plan_id): Path<String>, Json(pack): Json<DecisionPack>) -> ApiResult<(StatusCode, Json<Plan>)> {
    let plan_id = PlanId::parse(&plan_id).map_err(|_| ApiError::bad_request("invalid plan_id"))?;
    if pack.plan_id.as_str() != plan_id.as_str() {
        return Err(ApiError::bad_request("decision pack plan_id does not match the path plan_id"));
    }
    Ok((StatusCode::CREATED, Json(state.core.apply_decision_pack(plan_id, pack).await?)))
}

pub async fn get_decision_pack_plan(State(state): State<AppState>, Path((plan_id, decision_pack_id)): Path<(String, String)>) -> ApiResult<Json<Plan>> {
    let plan_id = PlanId::parse(&plan_id).map_err(|_| ApiError::bad_request("invalid plan_id"))?;
    let decision_pack_id = DecisionPackId::parse(&decision_pack_id).map_err(|_| ApiError::bad_request("invalid decision_pack_id"))?;
    Ok(Json(state.core.get_decision_pack_plan(plan_id, decision_pack_id).await?))
}

/// Body for `POST /api/plan/apply` (§6.1). This is the same underlying
/// `ApplyRequest`/gate/idempotency path as `POST /api/jobs` (§4.6),
/// except this one runs synchronously on the caller's request instead
/// of going through the Job Queue — used for small, interactive applies
/// from the UI where a round-trip poll would be overkill.
#[derive(Debug, Deserialize)]
pub struct ApplyRequestBody {
    pub plan_id: String,
    pub decision_pack_id: Option<String>,
    pub items: Vec<String>,
    pub max_uploads: u32,
    pub stop_on_first_error: bool,
    pub rate_limit_seconds: f64,
    pub client_request_id: String,
}

pub async fn apply_plan(State(state): State<AppState>, headers: axum::http::HeaderMap, Json(body): Json<ApplyRequestBody>) -> ApiResult<Json<cae_protocol::plan::ExecutionResult>> {
    if let Some(cached) = state.idempotency.lookup(&body.client_request_id)? {
        return Ok(Json(cached));
    }

    let real_uploader_header_present = crate::jobs::real_uploader_header(&headers);
    let job_request = crate::jobs::ApplyJobRequest {
        plan_id: body.plan_id,
        decision_pack_id: body.decision_pack_id,
        item_ids: body.items,
        max_uploads: body.max_uploads,
        stop_on_first_error: body.stop_on_first_error,
        rate_limit_seconds: body.rate_limit_seconds,
        client_request_id: body.client_request_id.clone(),
    };
    let spec = crate::jobs::gate_and_build_spec(&state, &job_request, real_uploader_header_present).await?;

    let job = state.core.enqueue_apply_job(spec).await?;
    let result = crate::jobs::poll_until_terminal(&state, job.job_id).await?;
    state.idempotency.record(&body.client_request_id, result.clone())?;
    Ok(Json(result))
}
