//! `/api/runs/{run_id}/metrics`, `/api/metrics/summary` (§6.1). Per-run
//! metrics are a flat file under the repository root's `runs/` tree
//! (§6.2); reading them doesn't need to round-trip through `CoreHandle`
//! any more than the Core's own `metrics_summary` implementation does.

use axum::extract::{Path, State};
use axum::Json;
use cae_ids::RunId;
use cae_core::metrics::MetricsSummary;
use cae_protocol::plan::RunMetrics;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn get_run_metrics(State(state): State<AppState>, Path(run_id): Path<String>) -> ApiResult<Json<RunMetrics>> {
    let run_id = RunId::parse(&run_id).map_err(|_| ApiError::bad_request("invalid run_id"))?;
    let runs_root = state.options.repository_root.join("runs");
    let metrics = cae_core::metrics::load(&runs_root, &run_id)?.ok_or_else(|| ApiError::not_found("no metrics recorded for this run"))?;
    Ok(Json(metrics))
}

pub async fn get_metrics_summary(State(state): State<AppState>) -> ApiResult<Json<MetricsSummary>> {
    Ok(Json(state.core.metrics_summary().await?))
}
