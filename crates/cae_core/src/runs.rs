//! Core-level registry of active `HeadfulRun`s (§4.3.1, §4.4): each
//! entry pairs a `RunDriver` (state machine + action-admission gate)
//! with the `Connector` it owns exclusively. `apply.rs` and the REST
//! `execute_action` handler both borrow the same `Arc<ActiveRun>`
//! rather than each opening their own browser session.

use std::collections::HashMap;
use std::sync::Arc;

use cae_ids::{PlatformKey, RunId};
use cae_portal::{Connector, PortalError, RunDriver};
use tokio::sync::{Mutex, RwLock};

use crate::error::CoreError;

/// Requests accepted by `POST /runs/{id}/execute_action` (§6.1). Kept
/// as a closed set rather than a free-form action name, matching the
/// Connector trait's own closed method set (§4.7).
#[derive(Debug, Clone)]
pub enum RunAction {
    Login,
    NavigateToPending,
    ExtractPending { max_pages: u32 },
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunActionResult {
    LoggedIn,
    Navigated { screen_signature: String },
    Extracted { items: Vec<cae_protocol::PendingRequirement> },
}

pub struct ActiveRun {
    pub driver: RunDriver,
    pub platform_key: PlatformKey,
    connector: Mutex<Box<dyn Connector>>,
}

impl ActiveRun {
    /// Runs `action` under the run's action-admission gate (§4.4: a run
    /// never accepts a second `execute_action` while one is in
    /// flight), transitioning back to `Ready` on success or `Failed` on
    /// error.
    pub async fn execute_action(&self, action: RunAction) -> Result<RunActionResult, PortalError> {
        let guard = self.driver.begin_action().await?;
        let mut connector = self.connector.lock().await;
        let outcome = match action {
            RunAction::Login => connector.login().await.map(|_| RunActionResult::LoggedIn),
            RunAction::NavigateToPending => connector.navigate_to_pending().await.map(|sig| RunActionResult::Navigated { screen_signature: sig }),
            RunAction::ExtractPending { max_pages } => connector.extract_pending(max_pages).await.map(|items| RunActionResult::Extracted { items }),
        };
        drop(connector);
        match outcome {
            Ok(result) => {
                guard.succeed().await;
                Ok(result)
            }
            Err(err) => {
                guard.fail(err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Drives the `Created -> BrowserStarted -> Authenticated -> Ready`
    /// preamble (§4.3.1) that happens once, outside the per-action gate
    /// (the action gate only governs `execute_action`, which is only
    /// legal once a run is already `Ready`).
    pub async fn start_session(&self) -> Result<(), PortalError> {
        self.driver.mark_browser_started().await;
        self.connector.lock().await.login().await?;
        self.driver.mark_authenticated().await;
        self.connector.lock().await.navigate_to_pending().await?;
        self.driver.mark_ready().await;
        Ok(())
    }

    /// Used by `apply.rs` to drive uploads directly against the run's
    /// connector, outside the single-action-at-a-time `execute_action`
    /// gate, since an apply job already serializes its own per-item
    /// loop (§4.5.3).
    pub async fn connector_mut(&self) -> tokio::sync::MutexGuard<'_, Box<dyn Connector>> {
        self.connector.lock().await
    }

    pub async fn close(&self) {
        self.driver.mark_closed().await;
    }
}

#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<RunId, Arc<ActiveRun>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, run_id: RunId, platform_key: PlatformKey, tenant_id: String, storage_state_ref: String, allowlisted_domain: String, connector: Box<dyn Connector>) -> Arc<ActiveRun> {
        let active = Arc::new(ActiveRun {
            driver: RunDriver::new(run_id.clone(), platform_key.clone(), tenant_id, storage_state_ref, allowlisted_domain),
            platform_key,
            connector: Mutex::new(connector),
        });
        self.runs.write().await.insert(run_id, active.clone());
        active
    }

    pub async fn get(&self, run_id: &RunId) -> Result<Arc<ActiveRun>, CoreError> {
        self.runs.read().await.get(run_id).cloned().ok_or_else(|| CoreError::RunNotFound(run_id.clone()))
    }

    pub async fn remove(&self, run_id: &RunId) -> Option<Arc<ActiveRun>> {
        self.runs.write().await.remove(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cae_portal::{ScreenSignature, UploadEvidence, UploadSpec};

    struct StubConnector;

    #[async_trait]
    impl Connector for StubConnector {
        async fn login(&mut self) -> Result<(), PortalError> {
            Ok(())
        }
        async fn navigate_to_pending(&mut self) -> Result<ScreenSignature, PortalError> {
            Ok("sig".to_string())
        }
        async fn extract_pending(&mut self, _max_pages: u32) -> Result<Vec<cae_protocol::PendingRequirement>, PortalError> {
            Ok(Vec::new())
        }
        async fn upload_one(&mut self, _item: &cae_protocol::PendingRequirement, _spec: &UploadSpec) -> Result<UploadEvidence, PortalError> {
            Ok(UploadEvidence::default())
        }
    }

    #[tokio::test]
    async fn register_then_get_returns_the_same_run() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry
            .register(run_id.clone(), PlatformKey::new("ctaima"), "tenant-1".into(), "storage.json".into(), "portal.example".into(), Box::new(StubConnector))
            .await;
        assert!(registry.get(&run_id).await.is_ok());
        assert!(registry.get(&RunId::new()).await.is_err());
    }

    #[tokio::test]
    async fn start_session_reaches_ready() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        let active = registry
            .register(run_id, PlatformKey::new("ctaima"), "tenant-1".into(), "storage.json".into(), "portal.example".into(), Box::new(StubConnector))
            .await;
        active.start_session().await.unwrap();
        let snapshot = active.driver.snapshot().await;
        assert_eq!(snapshot.state, cae_protocol::HeadfulState::Ready);
    }

    #[tokio::test]
    async fn execute_action_returns_to_ready_on_success() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        let active = registry
            .register(run_id, PlatformKey::new("ctaima"), "tenant-1".into(), "storage.json".into(), "portal.example".into(), Box::new(StubConnector))
            .await;
        active.start_session().await.unwrap();
        let result = active.execute_action(RunAction::ExtractPending { max_pages: 1 }).await.unwrap();
        assert!(matches!(result, RunActionResult::Extracted { .. }));
    }
}
