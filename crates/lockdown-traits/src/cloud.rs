//! Seams for the compute-instance registry, the remote-command agent and the
//! identity subsystem.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Status of a dispatched remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    InProgress,
    Succeeded,
    /// Terminal failure; carries whatever diagnostic output the agent
    /// captured.
    Failed { output: String },
}

/// Control plane of the compute-instance registry.
#[async_trait]
pub trait ComputeControl: Send + Sync {
    /// Replace the instance's network-group membership wholesale.
    async fn set_security_groups(
        &self,
        instance_id: &str,
        region: &str,
        group_ids: &[String],
    ) -> Result<()>;

    /// Issue the halt command. Idempotent at the provider level.
    async fn stop_instance(&self, instance_id: &str, region: &str) -> Result<()>;

    /// Display name for notifications, when the registry has one.
    async fn instance_name(&self, instance_id: &str, region: &str) -> Result<Option<String>>;

    /// Identity role attached to the instance via its profile, when any.
    async fn instance_role(&self, instance_id: &str, region: &str) -> Result<Option<String>>;

    /// Remove the identity-profile association entirely.
    async fn detach_instance_profile(&self, instance_id: &str, region: &str) -> Result<()>;
}

/// The out-of-band remote-command execution agent.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Submit a multi-line script for execution on the target. Returns a
    /// command id to poll.
    async fn send_command(&self, instance_id: &str, region: &str, script: &str) -> Result<String>;

    async fn command_status(&self, command_id: &str, instance_id: &str) -> Result<CommandStatus>;

    /// Active remote shell sessions targeting the instance.
    async fn list_sessions(&self, instance_id: &str) -> Result<Vec<String>>;

    async fn terminate_session(&self, session_id: &str) -> Result<()>;
}

/// The identity/access subsystem.
#[async_trait]
pub trait IdentityControl: Send + Sync {
    /// Attach an inline deny-all policy to `role`, time-scoped at `cutoff` so
    /// that only future token issuance is blocked. Sessions already live at
    /// the cutoff keep working.
    async fn attach_deny_policy(&self, role: &str, cutoff: DateTime<Utc>) -> Result<()>;
}
