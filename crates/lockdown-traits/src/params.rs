//! Seam for the shared key/value parameter store.
//!
//! The lock entries and the quarantine network-group id both live here. The
//! store is shared across invocations and across processes (the approval
//! handler may run separately from the containment pipeline), so the
//! conditional put must be atomic in the implementation.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ParamStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Atomic create-if-absent. Returns false when the key already exists.
    async fn put_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Delete a key. Returns whether it existed; deleting an absent key is
    /// not an error.
    async fn delete(&self, key: &str) -> Result<bool>;
}
