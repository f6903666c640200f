mod api;

use std::sync::Arc;

use lockdown_core::config::OrchestratorConfig;
use lockdown_core::{CollaboratorSet, OrchestratorCore};
use lockdown_storage::Storage;
use lockdown_traits::memory::{
    MemoryCompute, MemoryExecutor, MemoryFindingsFeed, MemoryIdentity, MemoryNotifier,
};
use lockdown_traits::ParamStore;

#[tokio::main]
async fn main() {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lockdown_server=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting containment orchestrator");

    let config = OrchestratorConfig::load().expect("Failed to load configuration");
    let storage =
        Arc::new(Storage::new(&config.db_path).expect("Failed to open embedded database"));

    // Development wiring: the embedded database backs the parameter store
    // (locks, quarantine group id), in-memory doubles stand in for the cloud
    // collaborators. Deployments swap these for provider SDK adapters.
    let params: Arc<dyn ParamStore> = Arc::new(storage.params.clone());
    let collaborators = CollaboratorSet {
        compute: Arc::new(MemoryCompute::new()),
        identity: Arc::new(MemoryIdentity::new()),
        executor: Arc::new(MemoryExecutor::new()),
        notifier: Arc::new(MemoryNotifier::new()),
        feed: Arc::new(MemoryFindingsFeed::new()),
        params,
    };

    let core = Arc::new(OrchestratorCore::new(config, storage, collaborators));
    let addr = format!("{}:{}", core.config.host, core.config.port);
    let app = api::router(core);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));

    tracing::info!("Containment orchestrator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
