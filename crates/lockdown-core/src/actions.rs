//! Containment actions engine.
//!
//! Each action is independently retryable and idempotent at the resource
//! level. The required/best-effort split lives here, in the open: best-effort
//! actions return visible `Result`s and `contain` logs and keeps going;
//! required failures abort with a typed error.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use lockdown_models::{RemediationSession, SessionStage, StepName, StepOutcome};
use lockdown_traits::{ComputeControl, IdentityControl, ParamStore, RemoteExecutor};
use tracing::{info, warn};

use crate::error::ContainmentError;

#[derive(Clone)]
pub struct ContainmentEngine {
    compute: Arc<dyn ComputeControl>,
    identity: Arc<dyn IdentityControl>,
    executor: Arc<dyn RemoteExecutor>,
    params: Arc<dyn ParamStore>,
    quarantine_param_key: String,
}

impl ContainmentEngine {
    pub fn new(
        compute: Arc<dyn ComputeControl>,
        identity: Arc<dyn IdentityControl>,
        executor: Arc<dyn RemoteExecutor>,
        params: Arc<dyn ParamStore>,
        quarantine_param_key: impl Into<String>,
    ) -> Self {
        Self {
            compute,
            identity,
            executor,
            params,
            quarantine_param_key: quarantine_param_key.into(),
        }
    }

    /// Run isolation plus the best-effort containment actions, recording an
    /// outcome per step. Fails only when network isolation fails.
    pub async fn contain(&self, session: &mut RemediationSession) -> Result<(), ContainmentError> {
        let instance_id = session.instance_id.clone();
        let region = session.region.clone();

        match self.isolate(&instance_id, &region).await {
            Ok(detail) => {
                info!(instance_id = %instance_id, %detail, "instance isolated");
                session.record(StepOutcome::ok(StepName::NetworkIsolation, detail));
                session.stage = SessionStage::Isolated;
            }
            Err(e) => {
                let detail = e.to_string();
                session.record(StepOutcome::failed(StepName::NetworkIsolation, &detail));
                return Err(ContainmentError::StepFailed {
                    step: "network isolation",
                    detail,
                });
            }
        }

        match self.terminate_sessions(&instance_id).await {
            Ok(count) => {
                session.record(StepOutcome::ok(
                    StepName::SessionTermination,
                    format!("{count} active sessions terminated"),
                ));
            }
            Err(e) => {
                warn!(instance_id = %instance_id, error = %e, "session termination failed");
                session.record(StepOutcome::failed(StepName::SessionTermination, e.to_string()));
            }
        }

        match self.revoke_credentials(&instance_id, &region).await {
            Ok(detail) => {
                session.record(StepOutcome::ok(StepName::CredentialRevocation, detail));
            }
            Err(e) => {
                warn!(instance_id = %instance_id, error = %e, "credential revocation failed");
                session.record(StepOutcome::failed(
                    StepName::CredentialRevocation,
                    e.to_string(),
                ));
            }
        }

        match self.detach_profile(&instance_id, &region).await {
            Ok(()) => {
                session.record(StepOutcome::ok(
                    StepName::ProfileDetachment,
                    "identity profile detached",
                ));
            }
            Err(e) => {
                warn!(instance_id = %instance_id, error = %e, "profile detachment failed");
                session.record(StepOutcome::failed(StepName::ProfileDetachment, e.to_string()));
            }
        }

        session.stage = SessionStage::Revoked;
        Ok(())
    }

    /// Reassign the instance's network membership to the quarantine group.
    /// The group id is read from the shared parameter store at containment
    /// time, not from static config.
    pub async fn isolate(&self, instance_id: &str, region: &str) -> Result<String> {
        let group_id = self
            .params
            .get(&self.quarantine_param_key)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "quarantine group id not found at {} for {}",
                    self.quarantine_param_key,
                    region
                )
            })?;

        self.compute
            .set_security_groups(instance_id, region, &[group_id.clone()])
            .await?;
        Ok(format!("network membership reassigned to {group_id}"))
    }

    /// Terminate every active remote session targeting the instance.
    /// Returns the count, which is informational only.
    pub async fn terminate_sessions(&self, instance_id: &str) -> Result<usize> {
        let sessions = self.executor.list_sessions(instance_id).await?;
        let mut terminated = 0;
        for session_id in &sessions {
            self.executor.terminate_session(session_id).await?;
            terminated += 1;
        }
        Ok(terminated)
    }

    /// Attach a time-conditioned deny-all policy to the instance's role so
    /// only future token issuance is blocked.
    pub async fn revoke_credentials(&self, instance_id: &str, region: &str) -> Result<String> {
        match self.compute.instance_role(instance_id, region).await? {
            Some(role) => {
                self.identity.attach_deny_policy(&role, Utc::now()).await?;
                Ok(format!("deny policy attached to role {role}"))
            }
            None => Ok("no identity role attached".to_string()),
        }
    }

    pub async fn detach_profile(&self, instance_id: &str, region: &str) -> Result<()> {
        self.compute.detach_instance_profile(instance_id, region).await
    }

    /// Issue the halt command. Lock deletion is the caller's job and must be
    /// attempted regardless of this result.
    pub async fn power_down(&self, instance_id: &str, region: &str) -> Result<()> {
        self.compute.stop_instance(instance_id, region).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockdown_models::StepStatus;
    use lockdown_traits::memory::{
        MemoryCompute, MemoryExecutor, MemoryIdentity, MemoryParamStore,
    };

    struct Fixture {
        compute: Arc<MemoryCompute>,
        identity: Arc<MemoryIdentity>,
        executor: Arc<MemoryExecutor>,
        params: Arc<MemoryParamStore>,
        engine: ContainmentEngine,
    }

    fn fixture(compute: MemoryCompute, executor: MemoryExecutor) -> Fixture {
        let compute = Arc::new(compute);
        let identity = Arc::new(MemoryIdentity::new());
        let executor = Arc::new(executor);
        let params = Arc::new(MemoryParamStore::new());
        params.seed("/security/quarantine-sg-id", "sg-quarantine");
        let engine = ContainmentEngine::new(
            compute.clone(),
            identity.clone(),
            executor.clone(),
            params.clone(),
            "/security/quarantine-sg-id",
        );
        Fixture {
            compute,
            identity,
            executor,
            params,
            engine,
        }
    }

    fn session() -> RemediationSession {
        RemediationSession::new("i-001", "ap-southeast-1")
    }

    #[tokio::test]
    async fn contain_runs_all_steps_in_order() {
        let f = fixture(
            MemoryCompute::new().with_role("i-001", "app-role"),
            MemoryExecutor::new().with_sessions(&["s-1", "s-2"]),
        );
        let mut session = session();

        f.engine.contain(&mut session).await.unwrap();

        assert_eq!(session.stage, SessionStage::Revoked);
        let steps: Vec<StepName> = session.outcomes.iter().map(|o| o.step).collect();
        assert_eq!(
            steps,
            vec![
                StepName::NetworkIsolation,
                StepName::SessionTermination,
                StepName::CredentialRevocation,
                StepName::ProfileDetachment,
            ]
        );
        assert!(session.outcomes.iter().all(|o| o.status == StepStatus::Ok));

        let assignments = f.compute.group_assignments.lock().unwrap();
        assert_eq!(assignments[0].1, vec!["sg-quarantine".to_string()]);
        assert_eq!(f.executor.terminated.lock().unwrap().len(), 2);
        assert_eq!(f.identity.denied_roles(), vec!["app-role".to_string()]);
        assert_eq!(f.compute.detached.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn isolation_failure_aborts_before_best_effort_steps() {
        let f = fixture(MemoryCompute::new(), MemoryExecutor::new().with_sessions(&["s-1"]));
        f.compute.fail_isolation(true);
        let mut session = session();

        match f.engine.contain(&mut session).await {
            Err(ContainmentError::StepFailed { step, .. }) => {
                assert_eq!(step, "network isolation");
            }
            other => panic!("expected StepFailed, got {other:?}"),
        }

        assert_eq!(session.outcomes.len(), 1);
        assert!(f.executor.terminated.lock().unwrap().is_empty());
        assert!(f.identity.denied_roles().is_empty());
    }

    #[tokio::test]
    async fn missing_quarantine_group_fails_isolation() {
        let f = fixture(MemoryCompute::new(), MemoryExecutor::new());
        f.params.delete("/security/quarantine-sg-id").await.unwrap();
        let mut session = session();

        let err = f.engine.contain(&mut session).await.unwrap_err();
        assert!(err.to_string().contains("quarantine group id not found"));
    }

    #[tokio::test]
    async fn best_effort_failures_do_not_block_later_steps() {
        let f = fixture(
            MemoryCompute::new().with_role("i-001", "app-role"),
            MemoryExecutor::new().with_sessions(&["s-1"]),
        );
        f.executor.fail_terminate(true);
        f.identity.fail_all(true);
        let mut session = session();

        f.engine.contain(&mut session).await.unwrap();

        let failed: Vec<StepName> = session
            .outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Failed)
            .map(|o| o.step)
            .collect();
        assert_eq!(
            failed,
            vec![StepName::SessionTermination, StepName::CredentialRevocation]
        );
        // Profile detachment still ran after the failures.
        assert_eq!(f.compute.detached.lock().unwrap().len(), 1);
        assert!(session.required_failure().is_none());
    }

    #[tokio::test]
    async fn revocation_without_role_is_a_no_op_success() {
        let f = fixture(MemoryCompute::new(), MemoryExecutor::new());
        let detail = f
            .engine
            .revoke_credentials("i-001", "ap-southeast-1")
            .await
            .unwrap();
        assert_eq!(detail, "no identity role attached");
        assert!(f.identity.denied_roles().is_empty());
    }
}
