//! Commands accepted by the Core loop (grounded on
//! `casparian_mcp::core::command`'s `Command`/`Responder` shape,
//! adapted from `std::sync::mpsc` to `tokio::sync::{mpsc, oneshot}`
//! since run execution and job dispatch are async). Every command
//! carries a `Responder<T>` the Core replies on exactly once.

use cae_ids::{DecisionPackId, JobId, PlanId, PlatformKey, RunId};
use cae_protocol::decision_pack::DecisionPack;
use cae_protocol::job::{ApplyJobSpec, Job};
use cae_protocol::matching::PendingRequirement;
use cae_protocol::plan::Plan;
use cae_portal::Connector;
use tokio::sync::oneshot;

use crate::error::CoreError;
use crate::plan::PlanBuildRequest;
use crate::runs::{RunAction, RunActionResult};

pub type Responder<T> = oneshot::Sender<Result<T, CoreError>>;

pub enum Command {
    BuildPlan {
        plan_id: PlanId,
        request: PlanBuildRequest,
        items: Vec<PendingRequirement>,
        respond: Responder<Plan>,
    },
    GetPlan {
        plan_id: PlanId,
        respond: Responder<Plan>,
    },
    ApplyDecisionPack {
        plan_id: PlanId,
        pack: DecisionPack,
        respond: Responder<Plan>,
    },
    GetDecisionPackPlan {
        plan_id: PlanId,
        decision_pack_id: DecisionPackId,
        respond: Responder<Plan>,
    },

    RegisterRun {
        run_id: RunId,
        platform_key: PlatformKey,
        tenant_id: String,
        storage_state_ref: String,
        allowlisted_domain: String,
        respond: Responder<()>,
    },
    StartRunSession {
        run_id: RunId,
        respond: Responder<()>,
    },
    ExecuteRunAction {
        run_id: RunId,
        action: RunAction,
        respond: Responder<RunActionResult>,
    },
    CloseRun {
        run_id: RunId,
        respond: Responder<()>,
    },
    GetRunStatus {
        run_id: RunId,
        respond: Responder<cae_protocol::run::HeadfulRun>,
    },

    EnqueueApplyJob {
        spec: ApplyJobSpec,
        respond: Responder<Job>,
    },
    GetJob {
        job_id: JobId,
        respond: Responder<Job>,
    },
    CancelJob {
        job_id: JobId,
        respond: Responder<()>,
    },
    ListJobs {
        status: Option<String>,
        respond: Responder<Vec<Job>>,
    },

    GetMetricsSummary {
        respond: Responder<crate::metrics::MetricsSummary>,
    },

    Shutdown,
}

/// What actually builds a fresh `Connector` for a platform, supplied by
/// the `cae` binary at start-up (it owns credential loading); the Core
/// only ever calls it, never inspects credentials itself (§5).
pub type ConnectorFactory = Box<dyn Fn(&PlatformKey) -> Result<Box<dyn Connector>, CoreError> + Send + Sync>;
