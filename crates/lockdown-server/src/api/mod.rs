pub mod approve;
pub mod findings;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use lockdown_core::OrchestratorCore;

pub type AppState = Arc<OrchestratorCore>;

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> axum::Json<Health> {
    axum::Json(Health {
        status: "lockdown is working!".to_string(),
    })
}

pub fn router(core: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/approve", get(approve::handle_approve))
        .route("/findings", post(findings::handle_findings))
        .with_state(core)
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use lockdown_core::config::OrchestratorConfig;
    use lockdown_core::CollaboratorSet;
    use lockdown_storage::Storage;
    use lockdown_traits::memory::{
        MemoryCompute, MemoryExecutor, MemoryFindingsFeed, MemoryIdentity, MemoryNotifier,
    };
    use lockdown_traits::ParamStore;
    use tempfile::TempDir;

    pub struct TestApp {
        pub _temp: TempDir,
        pub compute: Arc<MemoryCompute>,
        pub executor: Arc<MemoryExecutor>,
        pub notifier: Arc<MemoryNotifier>,
        pub feed: Arc<MemoryFindingsFeed>,
        pub params: Arc<dyn ParamStore>,
        pub core: AppState,
    }

    impl TestApp {
        pub fn router(&self) -> Router {
            router(self.core.clone())
        }
    }

    pub fn test_app() -> TestApp {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("lockdown.db");
        let storage = Arc::new(Storage::new(db_path.to_str().unwrap()).unwrap());

        let compute = Arc::new(MemoryCompute::new());
        let executor = Arc::new(MemoryExecutor::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let feed = Arc::new(MemoryFindingsFeed::new());
        let params: Arc<dyn ParamStore> = Arc::new(storage.params.clone());

        let core = Arc::new(OrchestratorCore::new(
            OrchestratorConfig::default(),
            storage,
            CollaboratorSet {
                compute: compute.clone(),
                identity: Arc::new(MemoryIdentity::new()),
                executor: executor.clone(),
                notifier: notifier.clone(),
                feed: feed.clone(),
                params: params.clone(),
            },
        ));

        TestApp {
            _temp: temp,
            compute,
            executor,
            notifier,
            feed,
            params,
            core,
        }
    }
}
