//! Approval workflow: token issuance, notification, callback verification
//! and finalize.
//!
//! The callback side is stateless and may run in a different process from
//! the containment pipeline; the only shared state is the signing secret and
//! the lock entry.

use std::sync::Arc;

use chrono::Duration;
use lockdown_models::RemediationSession;
use lockdown_traits::{ComputeControl, Notifier};
use tracing::{info, warn};

use crate::actions::ContainmentEngine;
use crate::error::TokenError;
use crate::lock::LockManager;
use crate::token::{ApprovalCodec, ApprovalQuery};

/// What the callback surface should render. Verification failures carry no
/// side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Halt issued and lock deletion attempted.
    Confirmed {
        instance_id: String,
        instance_name: String,
    },
    Expired,
    Unauthorized,
    Malformed(&'static str),
    /// Token verified but the halt command failed; the lock deletion was
    /// still attempted.
    StopFailed(String),
}

#[derive(Clone)]
pub struct ApprovalController {
    codec: ApprovalCodec,
    notifier: Arc<dyn Notifier>,
    compute: Arc<dyn ComputeControl>,
    engine: ContainmentEngine,
    locks: LockManager,
    base_url: String,
    token_ttl: Duration,
}

impl ApprovalController {
    pub fn new(
        codec: ApprovalCodec,
        notifier: Arc<dyn Notifier>,
        compute: Arc<dyn ComputeControl>,
        engine: ContainmentEngine,
        locks: LockManager,
        base_url: impl Into<String>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            notifier,
            compute,
            engine,
            locks,
            base_url: base_url.into(),
            token_ttl,
        }
    }

    /// Enter AwaitingApproval: issue a token and publish the notification
    /// with the checklist of completed automated actions and the link.
    pub async fn request_approval(&self, session: &RemediationSession) -> anyhow::Result<()> {
        let token = self
            .codec
            .issue(&session.instance_id, &session.region, self.token_ttl);
        let link = token.to_url(&self.base_url);

        let subject = format!(
            "[APPROVAL REQUIRED] Contain instance {} in {}",
            session.instance_id, session.region
        );
        let body = format!(
            "Instance {} in {} has been contained and is awaiting approval to power down.\n\
             \n\
             Completed automated actions:\n{}\n\
             \n\
             Approve power-down (valid {}h):\n{}\n",
            session.instance_id,
            session.region,
            session.checklist(),
            self.token_ttl.num_hours(),
            link,
        );

        self.notifier.publish(&subject, &body).await?;
        info!(instance_id = %session.instance_id, "approval requested");
        Ok(())
    }

    /// Handle an approval callback end to end.
    pub async fn handle_callback(&self, query: &ApprovalQuery) -> CallbackOutcome {
        let claims = match self.codec.verify(query) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return CallbackOutcome::Expired,
            Err(TokenError::InvalidSignature) => return CallbackOutcome::Unauthorized,
            Err(TokenError::Malformed(field)) => return CallbackOutcome::Malformed(field),
        };
        self.finalize(&claims.instance_id, &claims.region).await
    }

    /// Power the instance down and release its lock. The lock deletion is
    /// attempted even when the halt fails, so the manual-override path is
    /// never wedged; a deletion failure only logs a warning and never fails
    /// the user-visible response.
    async fn finalize(&self, instance_id: &str, region: &str) -> CallbackOutcome {
        let instance_name = match self.compute.instance_name(instance_id, region).await {
            Ok(Some(name)) => name,
            Ok(None) => instance_id.to_string(),
            Err(e) => {
                warn!(instance_id, error = %e, "instance name lookup failed");
                instance_id.to_string()
            }
        };

        let stop_result = self.engine.power_down(instance_id, region).await;

        match self.locks.release_instance(instance_id).await {
            Ok(true) => info!(instance_id, "lock released after approval"),
            Ok(false) => info!(instance_id, "lock was already absent"),
            Err(e) => warn!(instance_id, error = %e, "failed to delete lock entry"),
        }

        match stop_result {
            Ok(()) => {
                info!(instance_id, "instance stopping");
                CallbackOutcome::Confirmed {
                    instance_id: instance_id.to_string(),
                    instance_name,
                }
            }
            Err(e) => CallbackOutcome::StopFailed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ContainmentEngine;
    use lockdown_models::{StepName, StepOutcome};
    use lockdown_traits::memory::{
        MemoryCompute, MemoryExecutor, MemoryIdentity, MemoryNotifier, MemoryParamStore,
    };

    struct Fixture {
        compute: Arc<MemoryCompute>,
        notifier: Arc<MemoryNotifier>,
        params: Arc<MemoryParamStore>,
        controller: ApprovalController,
    }

    fn fixture(compute: MemoryCompute) -> Fixture {
        let compute = Arc::new(compute);
        let notifier = Arc::new(MemoryNotifier::new());
        let params = Arc::new(MemoryParamStore::new());
        let engine = ContainmentEngine::new(
            compute.clone(),
            Arc::new(MemoryIdentity::new()),
            Arc::new(MemoryExecutor::new()),
            params.clone(),
            "/security/quarantine-sg-id",
        );
        let locks = LockManager::new(params.clone(), "/security/lock/");
        let controller = ApprovalController::new(
            ApprovalCodec::new("test-secret"),
            notifier.clone(),
            compute.clone(),
            engine,
            locks,
            "https://approvals.example.com",
            Duration::hours(24),
        );
        Fixture {
            compute,
            notifier,
            params,
            controller,
        }
    }

    fn valid_query(instance_id: &str) -> ApprovalQuery {
        let codec = ApprovalCodec::new("test-secret");
        let token = codec.issue(instance_id, "ap-southeast-1", Duration::hours(1));
        ApprovalQuery {
            instance_id: Some(token.instance_id.clone()),
            region: Some(token.region.clone()),
            signature: Some(token.signature.clone()),
            expires: Some(token.expires_at.to_string()),
        }
    }

    #[tokio::test]
    async fn request_approval_publishes_checklist_and_link() {
        let f = fixture(MemoryCompute::new());
        let mut session = RemediationSession::new("i-001", "ap-southeast-1");
        session.record(StepOutcome::ok(StepName::ForensicCapture, "uploaded"));
        session.record(StepOutcome::ok(StepName::NetworkIsolation, "sg swapped"));

        f.controller.request_approval(&session).await.unwrap();

        let published = f.notifier.published();
        assert_eq!(published.len(), 1);
        let (subject, body) = &published[0];
        assert!(subject.contains("i-001"));
        assert!(body.contains("- forensic capture: ok (uploaded)"));
        assert!(body.contains("https://approvals.example.com/approve?instanceId=i-001"));
    }

    #[tokio::test]
    async fn approved_callback_stops_instance_and_releases_lock() {
        let f = fixture(MemoryCompute::new().with_name("i-001", "web-prod-01"));
        f.params.seed("/security/lock/i-001", "PENDING_APPROVAL");

        let outcome = f.controller.handle_callback(&valid_query("i-001")).await;
        assert_eq!(
            outcome,
            CallbackOutcome::Confirmed {
                instance_id: "i-001".to_string(),
                instance_name: "web-prod-01".to_string(),
            }
        );
        assert_eq!(f.compute.stopped_instances(), vec!["i-001".to_string()]);
        assert!(!f.params.contains("/security/lock/i-001"));
    }

    #[tokio::test]
    async fn expired_callback_has_no_side_effects() {
        let f = fixture(MemoryCompute::new());
        f.params.seed("/security/lock/i-001", "PENDING_APPROVAL");

        let codec = ApprovalCodec::new("test-secret");
        let token = codec.issue("i-001", "ap-southeast-1", Duration::milliseconds(-1000));
        let query = ApprovalQuery {
            instance_id: Some(token.instance_id.clone()),
            region: Some(token.region.clone()),
            signature: Some(token.signature.clone()),
            expires: Some(token.expires_at.to_string()),
        };

        let outcome = f.controller.handle_callback(&query).await;
        assert_eq!(outcome, CallbackOutcome::Expired);
        assert!(f.compute.stopped_instances().is_empty());
        assert!(f.params.contains("/security/lock/i-001"));
    }

    #[tokio::test]
    async fn tampered_callback_is_unauthorized() {
        let f = fixture(MemoryCompute::new());
        let mut query = valid_query("i-001");
        query.instance_id = Some("i-666".to_string());

        let outcome = f.controller.handle_callback(&query).await;
        assert_eq!(outcome, CallbackOutcome::Unauthorized);
        assert!(f.compute.stopped_instances().is_empty());
    }

    #[tokio::test]
    async fn missing_parameter_is_malformed() {
        let f = fixture(MemoryCompute::new());
        let outcome = f.controller.handle_callback(&ApprovalQuery::default()).await;
        assert_eq!(outcome, CallbackOutcome::Malformed("instanceId"));
    }

    #[tokio::test]
    async fn stop_failure_still_attempts_lock_deletion() {
        let f = fixture(MemoryCompute::new());
        f.compute.fail_stop(true);
        f.params.seed("/security/lock/i-001", "PENDING_APPROVAL");

        let outcome = f.controller.handle_callback(&valid_query("i-001")).await;
        match outcome {
            CallbackOutcome::StopFailed(msg) => assert!(msg.contains("stop rejected")),
            other => panic!("expected StopFailed, got {other:?}"),
        }
        // Lock deletion was attempted and succeeded despite the failed halt.
        assert!(!f.params.contains("/security/lock/i-001"));
    }

    #[tokio::test]
    async fn lock_deletion_failure_does_not_fail_the_response() {
        let f = fixture(MemoryCompute::new());
        let query = valid_query("i-001");
        // Store starts failing after the instance lookup/stop have run their
        // course; simulate by failing everything - stop and name come from
        // compute, not the param store, so only the deletion is affected.
        f.params.fail_all(true);

        let outcome = f.controller.handle_callback(&query).await;
        assert!(matches!(outcome, CallbackOutcome::Confirmed { .. }));
        assert_eq!(f.compute.stopped_instances(), vec!["i-001".to_string()]);
    }

    #[tokio::test]
    async fn name_falls_back_to_instance_id() {
        let f = fixture(MemoryCompute::new());
        let outcome = f.controller.handle_callback(&valid_query("i-001")).await;
        assert_eq!(
            outcome,
            CallbackOutcome::Confirmed {
                instance_id: "i-001".to_string(),
                instance_name: "i-001".to_string(),
            }
        );
    }
}
