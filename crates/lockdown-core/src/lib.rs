//! Core of the incident containment orchestrator.
//!
//! Wires the pipeline together: findings batches come in through
//! [`dispatcher::Dispatcher`], approval callbacks through
//! [`approval::ApprovalController`]. The HTTP surface lives in the server
//! crate; cloud-provider adapters implement the seams in lockdown-traits.

pub mod actions;
pub mod approval;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lock;
pub mod remote;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use lockdown_storage::Storage;
use lockdown_traits::{
    ComputeControl, FindingsFeed, IdentityControl, Notifier, ParamStore, RemoteExecutor,
};

use actions::ContainmentEngine;
use approval::ApprovalController;
use config::OrchestratorConfig;
use dispatcher::{DispatchSettings, Dispatcher};
use lock::LockManager;
use remote::RemoteCommandRunner;
use token::ApprovalCodec;

/// The external collaborators a deployment plugs in.
pub struct CollaboratorSet {
    pub compute: Arc<dyn ComputeControl>,
    pub identity: Arc<dyn IdentityControl>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub notifier: Arc<dyn Notifier>,
    pub feed: Arc<dyn FindingsFeed>,
    pub params: Arc<dyn ParamStore>,
}

/// Fully wired orchestrator, shared by the HTTP handlers.
pub struct OrchestratorCore {
    pub config: OrchestratorConfig,
    pub storage: Arc<Storage>,
    pub dispatcher: Dispatcher,
    pub approval: ApprovalController,
}

impl OrchestratorCore {
    pub fn new(
        config: OrchestratorConfig,
        storage: Arc<Storage>,
        collaborators: CollaboratorSet,
    ) -> Self {
        let locks = LockManager::new(collaborators.params.clone(), &config.lock_prefix);
        let runner = RemoteCommandRunner::new(collaborators.executor.clone()).with_timing(
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.max_wait_secs),
        );
        let engine = ContainmentEngine::new(
            collaborators.compute.clone(),
            collaborators.identity.clone(),
            collaborators.executor.clone(),
            collaborators.params.clone(),
            &config.quarantine_param_key,
        );
        let approval = ApprovalController::new(
            ApprovalCodec::new(&config.signing_secret),
            collaborators.notifier.clone(),
            collaborators.compute.clone(),
            engine.clone(),
            locks.clone(),
            &config.approval_base_url,
            chrono::Duration::hours(config.token_ttl_hours),
        );
        let dispatcher = Dispatcher::new(
            locks,
            runner,
            engine,
            approval.clone(),
            collaborators.feed,
            collaborators.notifier,
            storage.audit.clone(),
            DispatchSettings {
                forensics_script: config.forensics_script.clone(),
                evidence_bucket: config.evidence_bucket.clone(),
                default_region: config.default_region.clone(),
            },
        );

        Self {
            config,
            storage,
            dispatcher,
            approval,
        }
    }
}
