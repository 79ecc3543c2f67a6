//! `RunMetrics` aggregation and persistence (§3.1, §6.2 `runs/<run_id>/
//! metrics.json`). The type itself lives in `cae_protocol::plan`
//! (it's a wire shape every crate might want to read); this module
//! only knows how to build one up from plan decisions and flush it.

use std::collections::HashMap;
use std::path::Path;

use cae_protocol::plan::{DecisionSource, ExecutionSummary, Plan, RunMetrics};
use chrono::Utc;

use crate::error::CoreError;

pub fn metrics_from_plan(plan: &Plan) -> RunMetrics {
    let mut decisions_count = HashMap::new();
    for d in &plan.decisions {
        *decisions_count.entry(d.decision).or_insert(0) += 1;
    }
    let mut source_breakdown = HashMap::new();
    for d in &plan.decisions {
        let source = if d.debug.applied_hints.iter().any(|h| h.effect == cae_protocol::matching::HintEffect::Resolved) {
            DecisionSource::LearningHintResolved
        } else {
            DecisionSource::AutoMatching
        };
        *source_breakdown.entry(source).or_insert(0) += 1;
    }
    RunMetrics {
        total_items: plan.decisions.len(),
        decisions_count,
        source_breakdown,
        started_at: plan.created_at,
        finished_at: None,
    }
}

pub fn mark_finished(metrics: &mut RunMetrics) {
    metrics.finished_at = Some(Utc::now());
}

/// Aggregate metrics across every recorded run, for `/api/metrics/summary`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MetricsSummary {
    pub runs_counted: usize,
    pub total_items: usize,
    pub decisions_count: HashMap<cae_protocol::matching::Decision, usize>,
    pub source_breakdown: HashMap<DecisionSource, usize>,
    pub execution_summary: ExecutionSummary,
}

pub fn summarize(all: &[RunMetrics], executions: &[cae_protocol::plan::ExecutionResult]) -> MetricsSummary {
    let mut summary = MetricsSummary { runs_counted: all.len(), ..Default::default() };
    for m in all {
        summary.total_items += m.total_items;
        for (decision, count) in &m.decisions_count {
            *summary.decisions_count.entry(*decision).or_insert(0) += count;
        }
        for (source, count) in &m.source_breakdown {
            *summary.source_breakdown.entry(*source).or_insert(0) += count;
        }
    }
    for e in executions {
        summary.execution_summary.success += e.summary.success;
        summary.execution_summary.failed += e.summary.failed;
        summary.execution_summary.skipped += e.summary.skipped;
    }
    summary
}

pub fn load(runs_root: &Path, run_id: &cae_ids::RunId) -> Result<Option<RunMetrics>, CoreError> {
    let path = runs_root.join(run_id.as_str()).join("metrics.json");
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| cae_repository::RepositoryError::Io { path: path.display().to_string(), source: e })?;
    let metrics = serde_json::from_str(&raw).map_err(|e| cae_repository::RepositoryError::Json { path: path.display().to_string(), source: e })?;
    Ok(Some(metrics))
}

pub fn persist(runs_root: &Path, run_id: &cae_ids::RunId, metrics: &RunMetrics) -> Result<(), CoreError> {
    let path = runs_root.join(run_id.as_str()).join("metrics.json");
    cae_repository::store::atomic_write_json(&path, metrics).map_err(CoreError::from)
}
