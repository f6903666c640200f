//! Remediation session state and per-step outcomes.

use serde::{Deserialize, Serialize};

/// Where a session currently is in the containment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStage {
    New,
    Locked,
    Forensics,
    Isolated,
    Revoked,
    AwaitingApproval,
    Finalized,
    Aborted,
}

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepName {
    ForensicCapture,
    NetworkIsolation,
    SessionTermination,
    CredentialRevocation,
    ProfileDetachment,
    PowerDown,
}

impl StepName {
    /// Whether a failure of this step aborts the rest of the pipeline.
    pub fn required(self) -> bool {
        matches!(
            self,
            StepName::ForensicCapture | StepName::NetworkIsolation | StepName::PowerDown
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            StepName::ForensicCapture => "forensic capture",
            StepName::NetworkIsolation => "network isolation",
            StepName::SessionTermination => "session termination",
            StepName::CredentialRevocation => "credential revocation",
            StepName::ProfileDetachment => "profile detachment",
            StepName::PowerDown => "power down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Ok,
    Failed,
}

/// Outcome of one pipeline step, accumulated per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: StepName,
    pub required: bool,
    pub status: StepStatus,
    pub detail: String,
}

impl StepOutcome {
    pub fn ok(step: StepName, detail: impl Into<String>) -> Self {
        Self {
            step,
            required: step.required(),
            status: StepStatus::Ok,
            detail: detail.into(),
        }
    }

    pub fn failed(step: StepName, detail: impl Into<String>) -> Self {
        Self {
            step,
            required: step.required(),
            status: StepStatus::Failed,
            detail: detail.into(),
        }
    }
}

/// The unit of work for one compromised instance.
///
/// Sessions are transient: no persistent record survives finalize or abort.
/// Durable state lives in the lock entry and in the step side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationSession {
    pub instance_id: String,
    pub region: String,
    pub stage: SessionStage,
    pub outcomes: Vec<StepOutcome>,
    pub created_at: i64,
}

impl RemediationSession {
    pub fn new(instance_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            region: region.into(),
            stage: SessionStage::New,
            outcomes: Vec::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    /// First failed required step, if any.
    pub fn required_failure(&self) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.required && o.status == StepStatus::Failed)
    }

    /// Human-readable checklist of completed automated actions, one line per
    /// step, used in the approval notification.
    pub fn checklist(&self) -> String {
        self.outcomes
            .iter()
            .map(|o| {
                let mark = match o.status {
                    StepStatus::Ok => "ok",
                    StepStatus::Failed => "FAILED",
                };
                format!("- {}: {} ({})", o.step.label(), mark, o.detail)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Persisted audit entry for one session, written after the pipeline ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub instance_id: String,
    pub region: String,
    pub stage: SessionStage,
    pub outcomes: Vec<StepOutcome>,
    pub created_at: i64,
}

impl AuditRecord {
    pub fn from_session(id: impl Into<String>, session: &RemediationSession) -> Self {
        Self {
            id: id.into(),
            instance_id: session.instance_id.clone(),
            region: session.region.clone(),
            stage: session.stage,
            outcomes: session.outcomes.clone(),
            created_at: session.created_at,
        }
    }
}
