//! Plan construction and apply-execution results (§4.5, §3.1).

use std::collections::HashMap;

use cae_ids::{DecisionPackId, PlanId, PlatformKey, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::{Decision, MatchingDebugReport, PendingRequirement, ReasonCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemDecision {
    pub item: PendingRequirement,
    pub decision: Decision,
    pub reason_code: ReasonCode,
    pub reason: String,
    pub confidence: f64,
    pub local_doc_ref: Option<cae_ids::DocId>,
    pub debug: MatchingDebugReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total: usize,
    pub auto_upload: usize,
    pub review_required: usize,
    pub no_match: usize,
    pub skip: usize,
}

impl PlanSummary {
    pub fn from_decisions(decisions: &[PlanItemDecision]) -> Self {
        let mut summary = PlanSummary {
            total: decisions.len(),
            ..Default::default()
        };
        for d in decisions {
            match d.decision {
                Decision::AutoUpload => summary.auto_upload += 1,
                Decision::ReviewRequired => summary.review_required += 1,
                Decision::NoMatch => summary.no_match += 1,
                Decision::Skip => summary.skip += 1,
            }
        }
        summary
    }
}

/// Read-only plan construction output (§4.5.1). A sealed plan file is
/// immutable once written; applying a Decision Pack produces a new
/// derived plan sharing the same `plan_id` (§4.5.2) rather than mutating
/// this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    /// Set when this plan is derived from a Decision Pack applied over
    /// an earlier plan of the same id.
    pub decision_pack_id: Option<DecisionPackId>,
    /// The HeadfulRun this plan's items were scraped from. Apply (§4.5.3)
    /// reuses the same authenticated browser session rather than opening
    /// a second one, so a plan is only appliable against this run.
    pub run_id: RunId,
    pub platform_key: PlatformKey,
    pub coord_label: Option<String>,
    pub requested_company_key: Option<String>,
    pub requested_person_key: Option<String>,
    pub items: Vec<PendingRequirement>,
    pub decisions: Vec<PlanItemDecision>,
    pub summary: PlanSummary,
    pub diagnostics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemExecutionOutcome {
    pub pending_item_key: String,
    pub outcome: ItemOutcome,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Result of running `apply` (§4.5.3) for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: RunId,
    pub items: Vec<ItemExecutionOutcome>,
    pub summary: ExecutionSummary,
}

/// Source of a decision, used for the metrics breakdown (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    AutoMatching,
    LearningHintResolved,
    PresetApplied,
    ManualSingle,
    ManualBatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_items: usize,
    pub decisions_count: HashMap<Decision, usize>,
    pub source_breakdown: HashMap<DecisionSource, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
