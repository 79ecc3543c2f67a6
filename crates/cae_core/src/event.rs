//! Events the Core emits as commands complete (grounded on
//! `casparian_mcp::core::event`): a side channel for anything that
//! wants to observe state changes without blocking a command response
//! on it, such as a future SSE/log bridge in `cae_api`.

use cae_ids::{DecisionPackId, JobId, PlanId, RunId};

#[derive(Debug, Clone)]
pub enum Event {
    PlanBuilt { plan_id: PlanId },
    DecisionPackApplied { plan_id: PlanId, decision_pack_id: DecisionPackId },
    RunRegistered { run_id: RunId },
    RunSessionStarted { run_id: RunId },
    RunActionExecuted { run_id: RunId },
    RunClosed { run_id: RunId },
    JobEnqueued { job_id: JobId },
    JobCanceled { job_id: JobId },
}
