//! Findings-batch dispatcher: groups findings into per-instance sessions,
//! drives each session through the pipeline and closes the batch out with a
//! summary notification and a findings-feed update.

use std::collections::HashSet;
use std::sync::Arc;

use lockdown_models::{
    AuditRecord, Finding, FindingBatch, FindingIdentifier, RemediationSession, SessionStage,
    StepName, StepOutcome,
};
use lockdown_storage::AuditLogStorage;
use lockdown_traits::{FindingsFeed, Notifier};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actions::ContainmentEngine;
use crate::approval::ApprovalController;
use crate::error::ContainmentError;
use crate::lock::LockManager;
use crate::remote::{render_script, RemoteCommandRunner};

/// Status id for "resolved" on the findings feed.
const STATUS_RESOLVED: u8 = 2;

/// Per-batch settings the dispatcher needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub forensics_script: String,
    pub evidence_bucket: String,
    pub default_region: String,
}

/// What happened to each instance in a batch. Instance ids appear in
/// first-seen order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub contained: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub resolved_findings: usize,
}

#[derive(Clone)]
pub struct Dispatcher {
    locks: LockManager,
    runner: RemoteCommandRunner,
    engine: ContainmentEngine,
    approval: ApprovalController,
    feed: Arc<dyn FindingsFeed>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLogStorage,
    settings: DispatchSettings,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        locks: LockManager,
        runner: RemoteCommandRunner,
        engine: ContainmentEngine,
        approval: ApprovalController,
        feed: Arc<dyn FindingsFeed>,
        notifier: Arc<dyn Notifier>,
        audit: AuditLogStorage,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            locks,
            runner,
            engine,
            approval,
            feed,
            notifier,
            audit,
            settings,
        }
    }

    /// Process one findings batch end to end.
    ///
    /// Every finding in the batch is marked resolved on the feed, including
    /// findings whose instance was skipped or failed; the feed comment and
    /// the summary notification disclose what actually ran. Errors from the
    /// batch-level publish/update abort the batch and surface to the caller.
    pub async fn handle_batch(&self, batch: FindingBatch) -> anyhow::Result<BatchOutcome> {
        let findings = &batch.detail.findings;
        let identifiers: Vec<FindingIdentifier> =
            findings.iter().map(Finding::identifier).collect();

        let mut outcome = BatchOutcome::default();
        let mut summary_lines = Vec::new();

        for (instance_id, region) in self.group_by_instance(findings) {
            let session = self.run_session(&instance_id, &region).await;

            match session {
                Ok(session) => {
                    info!(instance_id = %instance_id, "instance contained, awaiting approval");
                    summary_lines.push(format!(
                        "Instance {instance_id} ({region}):\n{}",
                        session.checklist()
                    ));
                    outcome.contained.push(instance_id);
                }
                Err(SessionFailure::Skipped) => {
                    info!(instance_id = %instance_id, "containment already in progress, skipping");
                    summary_lines
                        .push(format!("Instance {instance_id}: already being contained, skipped"));
                    outcome.skipped.push(instance_id);
                }
                Err(SessionFailure::Aborted { reason, session }) => {
                    error!(instance_id = %instance_id, %reason, "containment session aborted");
                    summary_lines.push(format!(
                        "Instance {instance_id} ({region}): ABORTED ({reason})\n{}",
                        session.checklist()
                    ));
                    outcome.failed.push((instance_id, reason));
                }
            }
        }

        if !findings.is_empty() {
            let subject = format!(
                "[ACTION TAKEN] Security containment in {}",
                self.settings.default_region
            );
            let body = format!(
                "The following actions were taken automatically:\n\n{}",
                summary_lines.join("\n\n")
            );
            self.notifier.publish(&subject, &body).await?;

            let comment = format!(
                "Automated containment: {} contained, {} skipped, {} failed",
                outcome.contained.len(),
                outcome.skipped.len(),
                outcome.failed.len()
            );
            self.feed
                .update_findings(&identifiers, &comment, STATUS_RESOLVED)
                .await?;
            outcome.resolved_findings = identifiers.len();
        }

        Ok(outcome)
    }

    /// Unique implicated instances, in first-seen order. Findings without a
    /// compute-instance resource contribute to the feed update only.
    fn group_by_instance(&self, findings: &[Finding]) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        let mut instances = Vec::new();
        for finding in findings {
            if let Some(instance_id) = finding.instance_id() {
                if seen.insert(instance_id.to_string()) {
                    let region = finding
                        .region()
                        .unwrap_or(&self.settings.default_region)
                        .to_string();
                    instances.push((instance_id.to_string(), region));
                }
            }
        }
        instances
    }

    /// Run one instance's session and persist its audit record. Skipped
    /// instances leave no audit entry; the audit append itself is
    /// best-effort, a storage failure is logged, never fatal.
    async fn run_session(&self, instance_id: &str, region: &str) -> SessionResult {
        let mut session = RemediationSession::new(instance_id, region);
        let result = self.drive(&mut session).await;

        if let Err(e) = &result {
            if matches!(e, ContainmentError::AlreadyLocked(_)) {
                return Err(SessionFailure::Skipped);
            }
            // The lock entry stays in place for manual review.
            session.stage = SessionStage::Aborted;
        }

        let record = AuditRecord::from_session(Uuid::new_v4().to_string(), &session);
        if let Err(e) = self.audit.append(&record) {
            warn!(instance_id, error = %e, "failed to persist audit record");
        }

        match result {
            Ok(()) => Ok(session),
            Err(e) => Err(SessionFailure::Aborted {
                reason: e.to_string(),
                session,
            }),
        }
    }

    /// The pipeline proper: lock, capture forensics, contain, request
    /// approval. Forensics runs before isolation so the capture script still
    /// has its network path to the evidence store.
    async fn drive(&self, session: &mut RemediationSession) -> Result<(), ContainmentError> {
        let instance_id = session.instance_id.clone();
        let region = session.region.clone();

        self.locks.try_acquire(&instance_id).await?;
        session.stage = SessionStage::Locked;

        let script = render_script(
            &self.settings.forensics_script,
            &instance_id,
            &region,
            &self.settings.evidence_bucket,
        );
        let command_id = self.runner.dispatch(&instance_id, &region, &script).await?;
        match self.runner.await_completion(&command_id, &instance_id).await {
            Ok(()) => {
                session.record(StepOutcome::ok(
                    StepName::ForensicCapture,
                    "evidence archive uploaded",
                ));
                session.stage = SessionStage::Forensics;
            }
            Err(e) => {
                session.record(StepOutcome::failed(StepName::ForensicCapture, e.to_string()));
                return Err(e);
            }
        }

        self.engine.contain(session).await?;

        session.stage = SessionStage::AwaitingApproval;
        self.approval
            .request_approval(session)
            .await
            .map_err(ContainmentError::Store)?;
        Ok(())
    }
}

type SessionResult = Result<RemediationSession, SessionFailure>;

enum SessionFailure {
    Skipped,
    Aborted {
        reason: String,
        session: RemediationSession,
    },
}
