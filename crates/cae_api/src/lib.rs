//! Thin axum REST transport (§6.1) wrapping `CoreHandle` for
//! orchestration and `Arc<Repository>`/`Arc<HintStore>` directly for
//! repository/learning reads, mirroring `casparian_mcp::server`'s shape
//! of a stateless transport over an owned Core.

pub mod error;
pub mod health;
pub mod jobs;
pub mod learning;
pub mod metrics;
pub mod plan;
pub mod repository;
pub mod runs;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    tracing::info!("assembling REST router");
    let repository_routes = Router::new()
        .route("/types", get(repository::types::list_types).post(repository::types::create_type))
        .route(
            "/types/:id",
            get(repository::types::get_type).put(repository::types::update_type).delete(repository::types::delete_type),
        )
        .route("/types/:id/toggle_active", post(repository::types::toggle_active))
        .route("/types/:id/duplicate", post(repository::types::duplicate_type))
        .route("/types/:id/expected", get(repository::types::expected_periods))
        .route("/docs", get(repository::docs::list_docs))
        .route("/docs/pending", get(repository::docs::list_pending_docs))
        .route("/docs/upload", post(repository::docs::upload_doc))
        .route(
            "/docs/:id",
            get(repository::docs::get_doc).put(repository::docs::update_doc).delete(repository::docs::delete_doc),
        )
        .route("/docs/:id/pdf", get(repository::docs::get_doc_pdf).put(repository::docs::replace_doc_pdf))
        .route("/docs/:id/override", post(repository::docs::set_doc_override))
        .route("/settings", get(repository::settings::get_settings).put(repository::settings::put_settings));

    let plan_routes = Router::new()
        .route("/build_readonly", post(plan::build_readonly))
        .route("/build_auto_upload_plan", post(plan::build_auto_upload_plan))
        .route("/apply", post(plan::apply_plan))
        .route("/:plan_id", get(plan::get_plan))
        .route("/:plan_id/decision_packs", post(plan::create_decision_pack))
        .route("/:plan_id/decision_packs/:decision_pack_id", get(plan::get_decision_pack_plan));

    let run_routes = Router::new()
        .route("/start", post(runs::start_run))
        .route("/:id/execute_action", post(runs::execute_action))
        .route("/:id/status", get(runs::get_status))
        .route("/:id/close", post(runs::close_run));

    let job_routes = Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/:id", get(jobs::get_job))
        .route("/:id/cancel", post(jobs::cancel_job));

    let learning_routes = Router::new()
        .route("/hints", get(learning::list_hints))
        .route("/hints/:id/disable", post(learning::disable_hint));

    Router::new()
        .nest("/api/repository", repository_routes)
        .nest("/api/plan", plan_routes)
        .nest("/runs", run_routes)
        .nest("/api/jobs", job_routes)
        .nest("/api/learning", learning_routes)
        .route("/api/runs/:run_id/metrics", get(metrics::get_run_metrics))
        .route("/api/metrics/summary", get(metrics::get_metrics_summary))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
