//! Seams for the notification bus and the upstream findings feed.

use anyhow::Result;
use async_trait::async_trait;
use lockdown_models::FindingIdentifier;

/// Notification bus (subject + plaintext body).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

/// Write-back channel to the findings feed.
#[async_trait]
pub trait FindingsFeed: Send + Sync {
    /// Update a batch of findings with a free-text comment and a numeric
    /// status code.
    async fn update_findings(
        &self,
        identifiers: &[FindingIdentifier],
        comment: &str,
        status_id: u8,
    ) -> Result<()>;
}
