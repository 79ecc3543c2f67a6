//! CAE submission core binary: wires `cae_core::Core` to the
//! `cae_portal::FantocciniConnector` registry and serves the `cae_api`
//! REST surface over it.

mod config_files;

use std::path::PathBuf;
use std::sync::Arc;

use cae_core::config::IDEMPOTENCY_RETENTION;
use cae_core::{Core, CoreContext, CoreOptions};
use cae_matching::HintStore;
use cae_portal::{ConnectorRegistry, Credentials, FantocciniConnector};
use cae_repository::Repository;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cae", about = "CAE document submission automation core")]
struct Args {
    /// Address to bind the REST server to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Number of Apply jobs the worker pool can run concurrently.
    #[arg(long, default_value_t = 2)]
    worker_pool_size: usize,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    cae_logging::init_logging(cae_logging::LogConfig { app_name: "cae", verbose: args.verbose })?;

    let options = Arc::new(CoreOptions::from_env());
    tracing::info!(repository_root = %options.repository_root.display(), webdriver_url = %options.webdriver_url, operator_mode = options.operator_mode, "starting CAE core");

    let config = Arc::new(config_files::load(&options.config_dir)?);
    tracing::info!(orgs = config.orgs.len(), people = config.people.len(), platforms = config.platforms.len(), "loaded configuration bundle");

    let repository = Arc::new(Repository::open(&options.repository_root)?);
    let hint_store = Arc::new(HintStore::open(options.repository_root.join("hints"))?);

    let mut connector_registry = ConnectorRegistry::new();
    for platform in &config.platforms {
        let Some(secret) = config.secret(&platform.platform_key) else {
            tracing::warn!(platform_key = platform.platform_key.as_str(), "no credentials configured, skipping connector registration");
            continue;
        };
        let webdriver_url = options.webdriver_url.clone();
        let platform = platform.clone();
        let username = secret.username.clone();
        let password = secret.password.clone();
        let storage_state_dir = options.repository_root.join("storage_state");
        let platform_key = platform.platform_key.clone();

        connector_registry.register(
            platform_key.clone(),
            Box::new(move || {
                let storage_state_path = storage_state_dir.join(format!("{}.json", platform_key.as_str()));
                Box::new(FantocciniConnector::new(
                    webdriver_url.clone(),
                    platform.clone(),
                    Credentials { username: username.clone(), password: password.clone() },
                    storage_state_path,
                )) as Box<dyn cae_portal::Connector>
            }),
        );
    }

    let idempotency = Arc::new(cae_core::idempotency::IdempotencyStore::open(options.repository_root.join("idempotency"), IDEMPOTENCY_RETENTION)?);

    let ctx = CoreContext {
        repository: repository.clone(),
        hint_store: hint_store.clone(),
        config: config.clone(),
        options: options.clone(),
        connector_registry,
    };

    let runs_root = options.repository_root.join("runs");
    let plans_root = options.repository_root.join("plans");
    let jobs_root = options.repository_root.join("jobs");
    let presets_path = options.repository_root.join("presets.json");
    std::fs::create_dir_all(&runs_root)?;
    std::fs::create_dir_all(&plans_root)?;
    std::fs::create_dir_all(&jobs_root)?;

    let (core_handle, mut events) = Core::spawn(ctx, plans_root, jobs_root, presets_path, args.worker_pool_size);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "core event");
        }
    });

    let state = cae_api::AppState {
        repository,
        hint_store,
        core: core_handle,
        idempotency,
        options,
    };

    let app = cae_api::router(state);
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(bind = %args.bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
