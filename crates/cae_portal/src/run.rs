//! `RunDriver`: the live counterpart of `cae_protocol::HeadfulRun`
//! (§4.4). Owns the state-machine transitions and the run-level
//! action-admission mutex ("a single action is admitted at a time");
//! `cae_protocol::HeadfulRun` itself stays a plain data record so it
//! can be serialized into `run_manifest.json` (§6.2) without dragging
//! the mutex along.

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use cae_ids::{PlatformKey, RunId};
use cae_protocol::run::{HeadfulRun, HeadfulState, RiskLevel, TimelineEventKind, DEFAULT_WARNING_ACTION_THRESHOLD};

use crate::error::PortalError;

pub struct RunDriver {
    state: Mutex<HeadfulRun>,
    action_gate: Mutex<()>,
    warning_action_threshold: usize,
}

impl RunDriver {
    pub fn new(run_id: RunId, platform_key: PlatformKey, tenant_id: String, storage_state_ref: String, allowlisted_domain: String) -> Self {
        let run = HeadfulRun {
            run_id,
            platform_key,
            tenant_id,
            storage_state_ref,
            allowlisted_domain,
            state: HeadfulState::Created,
            timeline: Vec::new(),
            risk_level: RiskLevel::Low,
        };
        Self {
            state: Mutex::new(run),
            action_gate: Mutex::new(()),
            warning_action_threshold: DEFAULT_WARNING_ACTION_THRESHOLD,
        }
    }

    /// An atomically-published read of the run's current state for
    /// consumers (§5: "consumers read an atomically-published
    /// snapshot").
    pub async fn snapshot(&self) -> HeadfulRun {
        self.state.lock().await.clone()
    }

    pub async fn push_event(&self, kind: TimelineEventKind, message: impl Into<String>) {
        let mut run = self.state.lock().await;
        run.push_event(kind, message, Utc::now(), self.warning_action_threshold);
    }

    async fn transition(&self, to: HeadfulState) {
        self.state.lock().await.state = to;
    }

    pub async fn mark_browser_started(&self) {
        self.transition(HeadfulState::BrowserStarted).await;
        self.push_event(TimelineEventKind::Info, "browser started, storage state loaded").await;
    }

    pub async fn mark_authenticated(&self) {
        self.transition(HeadfulState::Authenticated).await;
        self.push_event(TimelineEventKind::Success, "authenticated against known URL").await;
    }

    pub async fn mark_ready(&self) {
        self.transition(HeadfulState::Ready).await;
        self.push_event(TimelineEventKind::Success, "pending grid reached and validated").await;
    }

    pub async fn mark_failed(&self, message: impl Into<String>) {
        self.transition(HeadfulState::Failed).await;
        self.push_event(TimelineEventKind::Error, message).await;
    }

    pub async fn mark_closed(&self) {
        self.transition(HeadfulState::Closed).await;
        self.push_event(TimelineEventKind::RunClosed, "storage state flushed, run closed").await;
    }

    /// Admit exactly one `execute_action` at a time (§4.4, property 10:
    /// a run never accepts `execute_action` outside `Ready`). Holding
    /// the returned guard keeps out any concurrent `begin_action` call
    /// for the lifetime of the action.
    pub async fn begin_action(&self) -> Result<ActionGuard<'_>, PortalError> {
        let gate = self.action_gate.lock().await;
        {
            let mut run = self.state.lock().await;
            if !run.state.admits_execute_action() {
                return Err(PortalError::RunNotReady(format!("{:?}", run.state)));
            }
            run.state = HeadfulState::Executing;
        }
        self.push_event(TimelineEventKind::Action, "action admitted").await;
        Ok(ActionGuard { driver: self, _gate: gate })
    }
}

/// Held for the duration of one admitted action. Dropping it without
/// calling `succeed`/`fail` leaves the run `Executing`, which is
/// deliberate: an action that panics mid-flight should not silently
/// look `Ready` again to the next caller.
pub struct ActionGuard<'a> {
    driver: &'a RunDriver,
    _gate: MutexGuard<'a, ()>,
}

impl ActionGuard<'_> {
    pub async fn succeed(self) {
        self.driver.transition(HeadfulState::Ready).await;
    }

    pub async fn fail(self, message: impl Into<String>) {
        self.driver.mark_failed(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_driver() -> RunDriver {
        RunDriver::new(RunId::new(), PlatformKey::new("ctaima"), "tenant-1".into(), "storage/ctaima-tenant-1.json".into(), "portal.ctaima.example".into())
    }

    #[tokio::test]
    async fn rejects_execute_action_outside_ready() {
        let driver = new_driver();
        let err = driver.begin_action().await.unwrap_err();
        assert!(matches!(err, PortalError::RunNotReady(_)));
    }

    #[tokio::test]
    async fn admits_one_action_when_ready_and_returns_to_ready_on_success() {
        let driver = new_driver();
        driver.mark_ready().await;
        let guard = driver.begin_action().await.unwrap();
        assert_eq!(driver.snapshot().await.state, HeadfulState::Executing);
        guard.succeed().await;
        assert_eq!(driver.snapshot().await.state, HeadfulState::Ready);
    }

    #[tokio::test]
    async fn failed_action_leaves_run_failed() {
        let driver = new_driver();
        driver.mark_ready().await;
        let guard = driver.begin_action().await.unwrap();
        guard.fail("upload crashed").await;
        assert_eq!(driver.snapshot().await.state, HeadfulState::Failed);
    }

    #[tokio::test]
    async fn risk_level_escalates_to_high_after_error_event() {
        let driver = new_driver();
        driver.push_event(TimelineEventKind::Error, "boom").await;
        assert_eq!(driver.snapshot().await.risk_level, RiskLevel::High);
    }
}
