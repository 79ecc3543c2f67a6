//! `GET /healthz`, `GET /readyz` (§6.8, ambient). Neither is part of
//! the versioned §6.1 surface; both exist for container/process-manager
//! probes only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthBody {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

#[derive(Serialize)]
pub struct ReadyBody {
    pub status: &'static str,
    pub repository_writable: bool,
    pub job_queue_alive: bool,
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    let probe_path = state.options.repository_root.join(".readyz_probe");
    let repository_writable = std::fs::write(&probe_path, b"ok").is_ok();
    if repository_writable {
        let _ = std::fs::remove_file(&probe_path);
    }
    let job_queue_alive = state.core.list_jobs(None).await.is_ok();

    let ready = repository_writable && job_queue_alive;
    let body = ReadyBody {
        status: if ready { "ready" } else { "not_ready" },
        repository_writable,
        job_queue_alive,
    };
    (if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE }, Json(body))
}
