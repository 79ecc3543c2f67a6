//! Job Queue (§4.6): a small FIFO background worker over `apply::execute`.
//! Grounded on `casparian_mcp`'s job manager lifecycle naming
//! (create/start/complete/fail/cancel/list), adapted from its
//! DB-backed storage to the append-only `JsonStore<Job>` persistence
//! the rest of this repository uses, and from its single-queue model
//! to a worker pool gated by per-plan exclusivity (§5: "at most one
//! job per plan_id concurrently; independent plans run in parallel up
//! to a worker pool size").

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cae_ids::{JobId, PlanId};
use cae_matching::HintStore;
use cae_protocol::job::{ApplyJobSpec, Job, JobState};
use cae_repository::store::JsonStore;
use cae_repository::Repository;
use chrono::Utc;
use tokio::sync::{Mutex, Notify, RwLock, Semaphore};

use crate::config::ConfigBundle;
use crate::error::CoreError;
use crate::plan::{MatchingContext, PlanStore};
use crate::runs::RunRegistry;

type CancelFlag = Arc<AtomicBool>;

/// Everything a queued apply job needs to run, shared across every
/// worker. Held by `Arc` so spawned worker tasks can each hold a clone.
pub struct JobQueue {
    store: JsonStore<Job>,
    repository: Arc<Repository>,
    plan_store: Arc<PlanStore>,
    run_registry: Arc<RunRegistry>,
    hint_store: Arc<HintStore>,
    config: Arc<ConfigBundle>,
    pending: Mutex<VecDeque<JobId>>,
    active_plans: Mutex<HashSet<PlanId>>,
    cancel_flags: RwLock<HashMap<JobId, CancelFlag>>,
    semaphore: Arc<Semaphore>,
    notify: Notify,
}

impl JobQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        dir: std::path::PathBuf,
        repository: Arc<Repository>,
        plan_store: Arc<PlanStore>,
        run_registry: Arc<RunRegistry>,
        hint_store: Arc<HintStore>,
        config: Arc<ConfigBundle>,
        worker_pool_size: usize,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            store: JsonStore::new(dir).map_err(CoreError::from)?,
            repository,
            plan_store,
            run_registry,
            hint_store,
            config,
            pending: Mutex::new(VecDeque::new()),
            active_plans: Mutex::new(HashSet::new()),
            cancel_flags: RwLock::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(worker_pool_size.max(1))),
            notify: Notify::new(),
        })
    }

    /// Crash-safe resume (§4.6): on start-up, every persisted job still
    /// `Queued` is re-enqueued in `queued_at` order. A job that crashed
    /// mid-`Running` is left as-is; it has no further automatic
    /// recovery since its partial apply progress already has an honest
    /// history trail (§5).
    pub async fn resume_on_startup(&self) -> Result<(), CoreError> {
        let mut queued: Vec<Job> = self
            .store
            .load_all()
            .map_err(CoreError::from)?
            .into_iter()
            .filter(|j| matches!(j.state, JobState::Queued { .. }))
            .collect();
        queued.sort_by_key(|j| match &j.state {
            JobState::Queued { queued_at } => *queued_at,
            _ => unreachable!(),
        });
        let mut pending = self.pending.lock().await;
        let mut flags = self.cancel_flags.write().await;
        for job in queued {
            flags.insert(job.job_id.clone(), Arc::new(AtomicBool::new(false)));
            pending.push_back(job.job_id);
        }
        drop(flags);
        drop(pending);
        self.notify.notify_waiters();
        Ok(())
    }

    pub async fn enqueue(&self, spec: ApplyJobSpec) -> Result<Job, CoreError> {
        let job = Job::new(JobId::new(), spec, Utc::now());
        self.store.save(job.job_id.as_str(), &job).map_err(CoreError::from)?;
        self.cancel_flags.write().await.insert(job.job_id.clone(), Arc::new(AtomicBool::new(false)));
        self.pending.lock().await.push_back(job.job_id.clone());
        self.notify.notify_one();
        Ok(job)
    }

    pub fn get(&self, job_id: &JobId) -> Result<Job, CoreError> {
        self.store.load(job_id.as_str()).map_err(CoreError::from)?.ok_or_else(|| CoreError::JobNotFound(job_id.clone()))
    }

    pub fn list(&self, status: Option<&str>) -> Result<Vec<Job>, CoreError> {
        let mut jobs = self.store.load_all().map_err(CoreError::from)?;
        if let Some(status) = status {
            jobs.retain(|j| j.state.status_str() == status);
        }
        jobs.sort_by(|a, b| job_order_key(a).cmp(&job_order_key(b)));
        Ok(jobs)
    }

    /// Cancels a job (§4.6). A still-`Queued` job is removed from the
    /// pending deque and marked `Canceled` immediately; a `Running` job
    /// only has its cancel flag raised, and transitions to `Canceled`
    /// once the worker notices between items.
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), CoreError> {
        let mut job = self.get(job_id)?;
        if job.state.is_terminal() {
            return Ok(());
        }
        if let Some(flag) = self.cancel_flags.read().await.get(job_id) {
            flag.store(true, Ordering::SeqCst);
        }
        if matches!(job.state, JobState::Queued { .. }) {
            self.pending.lock().await.retain(|id| id != job_id);
            job.state = JobState::Canceled { canceled_at: Utc::now() };
            self.store.save(job_id.as_str(), &job).map_err(CoreError::from)?;
        }
        Ok(())
    }

    /// Spawns `worker_pool_size` long-running tasks that drain the
    /// pending queue. Each worker blocks on the shared semaphore permit
    /// for its whole iteration, so at most `worker_pool_size` apply runs
    /// execute concurrently, and `active_plans` additionally serializes
    /// same-plan jobs even when permits are available.
    pub fn spawn_workers(self: &Arc<Self>, worker_pool_size: usize) {
        for _ in 0..worker_pool_size.max(1) {
            let queue = self.clone();
            tokio::spawn(async move { queue.worker_loop().await });
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let Some(job_id) = self.claim_next().await else {
                self.notify.notified().await;
                continue;
            };
            let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
            self.run_job(&job_id).await;
        }
    }

    /// Pops the first pending job whose plan isn't already active,
    /// marking that plan active for the duration of the run. Jobs
    /// belonging to a busy plan stay in the deque in order so they're
    /// retried on the next wake-up instead of starved behind it.
    async fn claim_next(&self) -> Option<JobId> {
        let mut pending = self.pending.lock().await;
        let mut active = self.active_plans.lock().await;
        let mut skipped = VecDeque::new();
        let mut claimed = None;
        while let Some(job_id) = pending.pop_front() {
            let Ok(job) = self.get(&job_id) else {
                continue;
            };
            if active.contains(&job.spec.plan_id) {
                skipped.push_back(job_id);
                continue;
            }
            active.insert(job.spec.plan_id.clone());
            claimed = Some(job_id);
            break;
        }
        while let Some(job_id) = skipped.pop_front() {
            pending.push_front(job_id);
        }
        claimed
    }

    async fn run_job(&self, job_id: &JobId) {
        let Ok(mut job) = self.get(job_id) else { return };
        let plan_id = job.spec.plan_id.clone();
        let started_at = Utc::now();
        job.state = JobState::Running { started_at, items_done: 0, items_total: job.spec.item_ids.len() as u64 };
        let _ = self.store.save(job_id.as_str(), &job);

        let cancel_flag = self.cancel_flags.read().await.get(job_id).cloned().unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let result = self.execute_spec(&job.spec, &cancel_flag).await;

        let mut job = match self.get(job_id) {
            Ok(j) => j,
            Err(_) => return,
        };
        job.state = if cancel_flag.load(Ordering::SeqCst) {
            JobState::Canceled { canceled_at: Utc::now() }
        } else {
            match result {
                Ok(execution) => JobState::Succeeded { started_at, completed_at: Utc::now(), result: execution },
                Err(err) => JobState::Failed { started_at, failed_at: Utc::now(), error: err.to_string() },
            }
        };
        let _ = self.store.save(job_id.as_str(), &job);

        self.active_plans.lock().await.remove(&plan_id);
        self.cancel_flags.write().await.remove(job_id);
        self.notify.notify_waiters();
    }

    async fn execute_spec(&self, spec: &ApplyJobSpec, cancel_flag: &AtomicBool) -> Result<cae_protocol::plan::ExecutionResult, CoreError> {
        let plan = match &spec.decision_pack_id {
            Some(pack_id) => self.plan_store.load_decision_pack_plan(&spec.plan_id, pack_id)?,
            None => self.plan_store.load(&spec.plan_id)?,
        };
        let active_run = self.run_registry.get(&plan.run_id).await?;
        let rules = self.repository.rules.list_for_platform(&plan.platform_key);
        let hints = self.hint_store.list_active().map_err(CoreError::from)?;
        let ctx = MatchingContext::load(self.repository.clone(), hints, self.config.people.clone(), &plan.platform_key)?;
        let items = if spec.item_ids.is_empty() {
            plan.decisions
                .iter()
                .filter(|d| d.decision == cae_protocol::matching::Decision::AutoUpload)
                .map(|d| d.item.pending_item_key.clone())
                .collect()
        } else {
            spec.item_ids.clone()
        };
        crate::apply::execute(&active_run, &self.repository, &ctx, &plan, &rules, items, spec.rate_limit_seconds, spec.stop_on_first_error, cancel_flag).await
    }
}

fn job_order_key(job: &Job) -> chrono::DateTime<Utc> {
    match &job.state {
        JobState::Queued { queued_at } => *queued_at,
        JobState::Running { started_at, .. } => *started_at,
        JobState::Succeeded { started_at, .. } => *started_at,
        JobState::Failed { started_at, .. } => *started_at,
        JobState::Canceled { canceled_at } => *canceled_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_spec() -> ApplyJobSpec {
        ApplyJobSpec {
            plan_id: PlanId::new(),
            decision_pack_id: None,
            item_ids: Vec::new(),
            max_uploads: 5,
            stop_on_first_error: true,
            rate_limit_seconds: 0.0,
            client_request_id: "req-1".into(),
        }
    }

    fn sample_queue(dir: &std::path::Path) -> JobQueue {
        let repository = Arc::new(Repository::open(dir.join("repo")).unwrap());
        let plan_store = Arc::new(PlanStore::open(dir.join("plans")));
        let run_registry = Arc::new(RunRegistry::new());
        let hint_store = Arc::new(HintStore::open(dir.join("learning")).unwrap());
        let config = Arc::new(ConfigBundle::default());
        JobQueue::open(dir.join("jobs"), repository, plan_store, run_registry, hint_store, config, 2).unwrap()
    }

    #[tokio::test]
    async fn enqueue_then_list_returns_queued_job() {
        let dir = tempdir().unwrap();
        let queue = sample_queue(dir.path());
        let job = queue.enqueue(sample_spec()).await.unwrap();
        assert!(matches!(job.state, JobState::Queued { .. }));
        let jobs = queue.list(None).unwrap();
        assert_eq!(jobs.len(), 1);
        let queued_only = queue.list(Some("queued")).unwrap();
        assert_eq!(queued_only.len(), 1);
    }

    #[tokio::test]
    async fn canceling_a_queued_job_marks_it_canceled_and_drains_it() {
        let dir = tempdir().unwrap();
        let queue = sample_queue(dir.path());
        let job = queue.enqueue(sample_spec()).await.unwrap();
        queue.cancel(&job.job_id).await.unwrap();
        let reloaded = queue.get(&job.job_id).unwrap();
        assert!(matches!(reloaded.state, JobState::Canceled { .. }));
        assert!(queue.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn get_missing_job_is_an_error() {
        let dir = tempdir().unwrap();
        let queue = sample_queue(dir.path());
        assert!(queue.get(&JobId::new()).is_err());
    }
}
