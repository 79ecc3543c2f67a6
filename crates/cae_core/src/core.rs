//! The single-owner Core loop (grounded on `casparian_mcp::core::Core`/
//! `CoreHandle`, ported from its blocking `std::thread` + `std::sync::mpsc`
//! shape to `tokio::task` + `tokio::sync::{mpsc, oneshot}`, since browser
//! automation (`fantoccini`) and the REST surface (`axum`) are both async
//! and a blocking thread would have to bridge into an async runtime on
//! every call anyway.
//!
//! Repository reads/writes inside an apply job do **not** round-trip
//! through this loop: `cae_repository`'s persistence is already safe for
//! concurrent access (every write is a temp-file-then-rename onto its own
//! path, and nothing here is a mutable in-memory cache), so the Core's
//! job is tracking plan/job/run registries and dispatching, not gating
//! every repository read behind a single thread. The Core loop *does*
//! own plan construction, Decision Pack application and run lifecycle,
//! since those are either pure CPU or need the one `RunRegistry` everyone
//! shares.

use std::sync::Arc;

use cae_ids::PlatformKey;
use cae_portal::ConnectorRegistry;
use cae_protocol::matching::PendingRequirement;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::command::{Command, Responder};
use crate::config::{ConfigBundle, CoreOptions};
use crate::error::CoreError;
use crate::event::Event;
use crate::jobs::JobQueue;
use crate::metrics::MetricsSummary;
use crate::plan::{self, MatchingContext, PlanBuildRequest, PlanStore, PresetStore};
use crate::runs::RunRegistry;

use cae_matching::HintStore;
use cae_repository::Repository;

/// Handle for interacting with the Core from other tasks (REST handlers,
/// the job worker pool). Cheaply `Clone`; every method sends a `Command`
/// and awaits exactly one reply on a fresh oneshot channel.
#[derive(Clone)]
pub struct CoreHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl CoreHandle {
    async fn send_and_wait<T: Send + 'static>(&self, make_cmd: impl FnOnce(Responder<T>) -> Command) -> Result<T, CoreError> {
        let (tx, rx) = oneshot::channel();
        let cmd = make_cmd(tx);
        self.cmd_tx.send(cmd).await.map_err(|_| CoreError::ChannelClosed)?;
        rx.await.map_err(|_| CoreError::ChannelClosed)?
    }

    pub async fn build_plan(&self, plan_id: cae_ids::PlanId, request: PlanBuildRequest, items: Vec<PendingRequirement>) -> Result<cae_protocol::plan::Plan, CoreError> {
        self.send_and_wait(|respond| Command::BuildPlan { plan_id, request, items, respond }).await
    }

    pub async fn get_plan(&self, plan_id: cae_ids::PlanId) -> Result<cae_protocol::plan::Plan, CoreError> {
        self.send_and_wait(|respond| Command::GetPlan { plan_id, respond }).await
    }

    pub async fn apply_decision_pack(&self, plan_id: cae_ids::PlanId, pack: cae_protocol::decision_pack::DecisionPack) -> Result<cae_protocol::plan::Plan, CoreError> {
        self.send_and_wait(|respond| Command::ApplyDecisionPack { plan_id, pack, respond }).await
    }

    pub async fn get_decision_pack_plan(&self, plan_id: cae_ids::PlanId, decision_pack_id: cae_ids::DecisionPackId) -> Result<cae_protocol::plan::Plan, CoreError> {
        self.send_and_wait(|respond| Command::GetDecisionPackPlan { plan_id, decision_pack_id, respond }).await
    }

    pub async fn register_run(&self, run_id: cae_ids::RunId, platform_key: PlatformKey, tenant_id: String, storage_state_ref: String, allowlisted_domain: String) -> Result<(), CoreError> {
        self.send_and_wait(|respond| Command::RegisterRun { run_id, platform_key, tenant_id, storage_state_ref, allowlisted_domain, respond }).await
    }

    pub async fn start_run_session(&self, run_id: cae_ids::RunId) -> Result<(), CoreError> {
        self.send_and_wait(|respond| Command::StartRunSession { run_id, respond }).await
    }

    pub async fn execute_run_action(&self, run_id: cae_ids::RunId, action: crate::runs::RunAction) -> Result<crate::runs::RunActionResult, CoreError> {
        self.send_and_wait(|respond| Command::ExecuteRunAction { run_id, action, respond }).await
    }

    pub async fn close_run(&self, run_id: cae_ids::RunId) -> Result<(), CoreError> {
        self.send_and_wait(|respond| Command::CloseRun { run_id, respond }).await
    }

    pub async fn get_run_status(&self, run_id: cae_ids::RunId) -> Result<cae_protocol::run::HeadfulRun, CoreError> {
        self.send_and_wait(|respond| Command::GetRunStatus { run_id, respond }).await
    }

    pub async fn enqueue_apply_job(&self, spec: cae_protocol::job::ApplyJobSpec) -> Result<cae_protocol::job::Job, CoreError> {
        self.send_and_wait(|respond| Command::EnqueueApplyJob { spec, respond }).await
    }

    pub async fn get_job(&self, job_id: cae_ids::JobId) -> Result<cae_protocol::job::Job, CoreError> {
        self.send_and_wait(|respond| Command::GetJob { job_id, respond }).await
    }

    pub async fn cancel_job(&self, job_id: cae_ids::JobId) -> Result<(), CoreError> {
        self.send_and_wait(|respond| Command::CancelJob { job_id, respond }).await
    }

    pub async fn list_jobs(&self, status: Option<String>) -> Result<Vec<cae_protocol::job::Job>, CoreError> {
        self.send_and_wait(|respond| Command::ListJobs { status, respond }).await
    }

    pub async fn metrics_summary(&self) -> Result<MetricsSummary, CoreError> {
        self.send_and_wait(|respond| Command::GetMetricsSummary { respond }).await
    }

    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.cmd_tx.send(Command::Shutdown).await.map_err(|_| CoreError::ChannelClosed)
    }
}

/// Everything the Core loop owns. Built once at start-up by the `cae`
/// binary from `CoreOptions`/`ConfigBundle` and handed off to `Core::spawn`.
pub struct CoreContext {
    pub repository: Arc<Repository>,
    pub hint_store: Arc<HintStore>,
    pub config: Arc<ConfigBundle>,
    pub options: Arc<CoreOptions>,
    pub connector_registry: ConnectorRegistry,
}

pub struct Core {
    repository: Arc<Repository>,
    hint_store: Arc<HintStore>,
    config: Arc<ConfigBundle>,
    options: Arc<CoreOptions>,
    connector_registry: ConnectorRegistry,
    plan_store: Arc<PlanStore>,
    preset_store: Arc<PresetStore>,
    run_registry: Arc<RunRegistry>,
    job_queue: Arc<JobQueue>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
}

impl Core {
    /// Builds the Core and its `CoreHandle`/event receiver, and spawns
    /// both the command loop and the job queue's worker pool as tokio
    /// tasks. Command channel depth is small (16): every call round-trips
    /// synchronously via its own oneshot, so there is no reason for a
    /// deep backlog to build up under normal load.
    pub fn spawn(ctx: CoreContext, plans_root: std::path::PathBuf, jobs_root: std::path::PathBuf, presets_path: std::path::PathBuf, worker_pool_size: usize) -> (CoreHandle, mpsc::Receiver<Event>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(256);

        let plan_store = Arc::new(PlanStore::open(plans_root));
        let preset_store = Arc::new(PresetStore::open(presets_path));
        let run_registry = Arc::new(RunRegistry::new());
        let job_queue = Arc::new(
            JobQueue::open(jobs_root, ctx.repository.clone(), plan_store.clone(), run_registry.clone(), ctx.hint_store.clone(), ctx.config.clone(), worker_pool_size)
                .expect("job queue directory must be writable"),
        );

        let core = Core {
            repository: ctx.repository,
            hint_store: ctx.hint_store,
            config: ctx.config,
            options: ctx.options,
            connector_registry: ctx.connector_registry,
            plan_store,
            preset_store,
            run_registry,
            job_queue: job_queue.clone(),
            commands: cmd_rx,
            events: event_tx,
        };

        let job_queue_for_resume = job_queue.clone();
        tokio::spawn(async move {
            if let Err(err) = job_queue_for_resume.resume_on_startup().await {
                warn!(%err, "failed to resume queued jobs on startup");
            }
            job_queue_for_resume.spawn_workers(worker_pool_size);
        });

        tokio::spawn(core.run());

        (CoreHandle { cmd_tx }, event_rx)
    }

    async fn run(mut self) {
        info!("core command loop started");
        while let Some(cmd) = self.commands.recv().await {
            if matches!(cmd, Command::Shutdown) {
                break;
            }
            self.handle_command(cmd).await;
        }
        info!("core command loop stopped");
    }

    fn matching_context(&self, platform_key: &PlatformKey) -> Result<MatchingContext, CoreError> {
        let hints = self.hint_store.list_active().map_err(CoreError::from)?;
        MatchingContext::load(self.repository.clone(), hints, self.config.people.clone(), platform_key)
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::BuildPlan { plan_id, request, items, respond } => {
                let result = self
                    .matching_context(&request.platform_key)
                    .map(|ctx| plan::build_plan(plan_id.clone(), &request, items, &ctx))
                    .and_then(|plan| self.plan_store.seal(&plan).map(|_| plan));
                if result.is_ok() {
                    let _ = self.events.send(Event::PlanBuilt { plan_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::GetPlan { plan_id, respond } => {
                let _ = respond.send(self.plan_store.load(&plan_id));
            }

            Command::ApplyDecisionPack { plan_id, pack, respond } => {
                let result = self.apply_decision_pack(plan_id.clone(), pack);
                if let Some(decision_pack_id) = result.as_ref().ok().and_then(|p| p.decision_pack_id.clone()) {
                    let _ = self.events.send(Event::DecisionPackApplied { plan_id, decision_pack_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::GetDecisionPackPlan { plan_id, decision_pack_id, respond } => {
                let _ = respond.send(self.plan_store.load_decision_pack_plan(&plan_id, &decision_pack_id));
            }

            Command::RegisterRun { run_id, platform_key, tenant_id, storage_state_ref, allowlisted_domain, respond } => {
                let result = self.register_run(run_id.clone(), platform_key, tenant_id, storage_state_ref, allowlisted_domain).await;
                if result.is_ok() {
                    let _ = self.events.send(Event::RunRegistered { run_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::StartRunSession { run_id, respond } => {
                let result = self.start_run_session(&run_id).await;
                if result.is_ok() {
                    let _ = self.events.send(Event::RunSessionStarted { run_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::ExecuteRunAction { run_id, action, respond } => {
                let result = self.execute_run_action(&run_id, action).await;
                if result.is_ok() {
                    let _ = self.events.send(Event::RunActionExecuted { run_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::CloseRun { run_id, respond } => {
                let result = self.close_run(&run_id).await;
                if result.is_ok() {
                    let _ = self.events.send(Event::RunClosed { run_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::GetRunStatus { run_id, respond } => {
                let result = self.run_registry.get(&run_id).await;
                let result = match result {
                    Ok(run) => Ok(run.driver.snapshot().await),
                    Err(err) => Err(err),
                };
                let _ = respond.send(result);
            }

            Command::EnqueueApplyJob { spec, respond } => {
                let result = self.job_queue.enqueue(spec).await;
                if let Ok(job) = &result {
                    let _ = self.events.send(Event::JobEnqueued { job_id: job.job_id.clone() }).await;
                }
                let _ = respond.send(result);
            }

            Command::GetJob { job_id, respond } => {
                let _ = respond.send(self.job_queue.get(&job_id));
            }

            Command::CancelJob { job_id, respond } => {
                let result = self.job_queue.cancel(&job_id).await;
                if result.is_ok() {
                    let _ = self.events.send(Event::JobCanceled { job_id }).await;
                }
                let _ = respond.send(result);
            }

            Command::ListJobs { status, respond } => {
                let _ = respond.send(self.job_queue.list(status.as_deref()));
            }

            Command::GetMetricsSummary { respond } => {
                let _ = respond.send(self.metrics_summary());
            }

            Command::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn apply_decision_pack(&self, plan_id: cae_ids::PlanId, pack: cae_protocol::decision_pack::DecisionPack) -> Result<cae_protocol::plan::Plan, CoreError> {
        let base = self.plan_store.load(&plan_id)?;
        let ctx = self.matching_context(&base.platform_key)?;
        let derived = plan::apply_decision_pack(&base, &pack, &ctx, &self.hint_store, &self.preset_store)?;
        self.plan_store.seal_decision_pack(&derived, &pack)?;
        Ok(derived)
    }

    async fn register_run(&self, run_id: cae_ids::RunId, platform_key: PlatformKey, tenant_id: String, storage_state_ref: String, allowlisted_domain: String) -> Result<(), CoreError> {
        let connector = self
            .connector_registry
            .build(&platform_key)
            .ok_or_else(|| CoreError::ConnectorNotRegistered(platform_key.clone()))?;
        self.run_registry.register(run_id, platform_key, tenant_id, storage_state_ref, allowlisted_domain, connector).await;
        Ok(())
    }

    async fn start_run_session(&self, run_id: &cae_ids::RunId) -> Result<(), CoreError> {
        let run = self.run_registry.get(run_id).await?;
        run.start_session().await.map_err(CoreError::from)
    }

    async fn execute_run_action(&self, run_id: &cae_ids::RunId, action: crate::runs::RunAction) -> Result<crate::runs::RunActionResult, CoreError> {
        let run = self.run_registry.get(run_id).await?;
        run.execute_action(action).await.map_err(CoreError::from)
    }

    async fn close_run(&self, run_id: &cae_ids::RunId) -> Result<(), CoreError> {
        let run = self.run_registry.get(run_id).await?;
        run.close().await;
        self.run_registry.remove(run_id).await;
        Ok(())
    }

    fn metrics_summary(&self) -> Result<MetricsSummary, CoreError> {
        let runs_root = self.options.repository_root.join("runs");
        let mut all_metrics = Vec::new();
        if runs_root.exists() {
            for entry in std::fs::read_dir(&runs_root).map_err(|e| cae_repository::RepositoryError::Io { path: runs_root.display().to_string(), source: e })? {
                let entry = entry.map_err(|e| cae_repository::RepositoryError::Io { path: runs_root.display().to_string(), source: e })?;
                if let Ok(run_id) = cae_ids::RunId::parse(&entry.file_name().to_string_lossy()) {
                    if let Some(metrics) = crate::metrics::load(&runs_root, &run_id)? {
                        all_metrics.push(metrics);
                    }
                }
            }
        }
        let executions: Vec<cae_protocol::plan::ExecutionResult> = self
            .job_queue
            .list(Some("succeeded"))?
            .into_iter()
            .filter_map(|job| match job.state {
                cae_protocol::job::JobState::Succeeded { result, .. } => Some(result),
                _ => None,
            })
            .collect();
        Ok(crate::metrics::summarize(&all_metrics, &executions))
    }
}
