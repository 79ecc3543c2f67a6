//! Shared application state handed to every handler. Repository and
//! Learning Hint Store reads/writes bypass the Core command loop
//! entirely (§5: their persistence is already safe for concurrent
//! access); only plan/apply/run/job orchestration round-trips through
//! `CoreHandle`.

use std::sync::Arc;

use cae_core::idempotency::IdempotencyStore;
use cae_core::{CoreHandle, CoreOptions};
use cae_matching::HintStore;
use cae_repository::Repository;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub hint_store: Arc<HintStore>,
    pub core: CoreHandle,
    pub idempotency: Arc<IdempotencyStore>,
    pub options: Arc<CoreOptions>,
}
