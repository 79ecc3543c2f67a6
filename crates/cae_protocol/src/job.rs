//! Job Queue types (§4.6): FIFO background worker for Apply operations.

use cae_ids::{JobId, PlanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::ExecutionResult;

/// Tagged job lifecycle, each terminal/active variant carrying its own
/// timestamps — the same shape `casparian_mcp`'s job manager uses for
/// its own queue, adapted to an apply-job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued {
        queued_at: DateTime<Utc>,
    },
    Running {
        started_at: DateTime<Utc>,
        items_done: u64,
        items_total: u64,
    },
    Succeeded {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: ExecutionResult,
    },
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        error: String,
    },
    Canceled {
        canceled_at: DateTime<Utc>,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Failed { .. } | JobState::Canceled { .. }
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Queued { .. } | JobState::Running { .. })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            JobState::Queued { .. } => "queued",
            JobState::Running { .. } => "running",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::Canceled { .. } => "canceled",
        }
    }
}

/// Apply-job request payload, echoed back on the job record so a poller
/// can see exactly what it asked for (§4.5.3, §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyJobSpec {
    pub plan_id: PlanId,
    pub decision_pack_id: Option<cae_ids::DecisionPackId>,
    pub item_ids: Vec<String>,
    pub max_uploads: u32,
    pub stop_on_first_error: bool,
    pub rate_limit_seconds: f64,
    /// Client-supplied idempotency key (§5): a repeated request with the
    /// same key within the retention window returns the original result
    /// without re-executing uploads.
    pub client_request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub spec: ApplyJobSpec,
    pub state: JobState,
}

impl Job {
    pub fn new(job_id: JobId, spec: ApplyJobSpec, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            spec,
            state: JobState::Queued { queued_at: now },
        }
    }
}

pub const DEFAULT_MAX_UPLOADS_HARD_CAP: u32 = 5;
pub const DEFAULT_RATE_LIMIT_SECONDS: f64 = 1.5;
