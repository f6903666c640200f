//! Distributed per-instance lock.
//!
//! One entry per instance in the shared parameter store; its presence means a
//! containment session is active (or was aborted and awaits manual cleanup).
//! Acquisition is a single atomic conditional put, so two concurrent batches
//! racing on the same instance cannot both win.

use std::sync::Arc;

use lockdown_traits::ParamStore;
use tracing::debug;

use crate::error::ContainmentError;

/// Value stored while an instance awaits the approval decision.
pub const LOCK_PENDING_APPROVAL: &str = "PENDING_APPROVAL";

#[derive(Clone)]
pub struct LockManager {
    params: Arc<dyn ParamStore>,
    prefix: String,
}

/// Proof of a held lock. Deliberately has no Drop: an aborted session leaves
/// its lock entry behind for manual cleanup.
#[derive(Debug)]
pub struct LockHandle {
    pub instance_id: String,
    pub key: String,
}

impl LockManager {
    pub fn new(params: Arc<dyn ParamStore>, prefix: impl Into<String>) -> Self {
        Self {
            params,
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, instance_id: &str) -> String {
        format!("{}{}", self.prefix, instance_id)
    }

    /// Try to take the lock. `AlreadyLocked` means skip the instance; there
    /// is no queuing or blocking wait. Store errors abort the session for
    /// this instance only.
    pub async fn try_acquire(&self, instance_id: &str) -> Result<LockHandle, ContainmentError> {
        let key = self.key_for(instance_id);
        let acquired = self
            .params
            .put_if_absent(&key, LOCK_PENDING_APPROVAL)
            .await?;

        if !acquired {
            return Err(ContainmentError::AlreadyLocked(instance_id.to_string()));
        }

        debug!(instance_id, key = %key, "lock acquired");
        Ok(LockHandle {
            instance_id: instance_id.to_string(),
            key,
        })
    }

    /// Delete the lock entry. Idempotent: an absent key is not an error.
    pub async fn release(&self, handle: &LockHandle) -> anyhow::Result<bool> {
        self.params.delete(&handle.key).await
    }

    /// Release by instance id, for the approval path which never held a
    /// handle (it may run in a different process).
    pub async fn release_instance(&self, instance_id: &str) -> anyhow::Result<bool> {
        self.params.delete(&self.key_for(instance_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockdown_traits::memory::MemoryParamStore;

    fn manager(store: Arc<MemoryParamStore>) -> LockManager {
        LockManager::new(store, "/security/lock/")
    }

    #[tokio::test]
    async fn acquire_then_conflict_then_release() {
        let store = Arc::new(MemoryParamStore::new());
        let locks = manager(store.clone());

        let handle = locks.try_acquire("i-001").await.unwrap();
        assert_eq!(handle.key, "/security/lock/i-001");
        assert!(store.contains("/security/lock/i-001"));

        match locks.try_acquire("i-001").await {
            Err(ContainmentError::AlreadyLocked(id)) => assert_eq!(id, "i-001"),
            other => panic!("expected AlreadyLocked, got {other:?}"),
        }

        assert!(locks.release(&handle).await.unwrap());
        assert!(locks.try_acquire("i-001").await.is_ok());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(MemoryParamStore::new());
        let locks = manager(store);

        let handle = locks.try_acquire("i-002").await.unwrap();
        assert!(locks.release(&handle).await.unwrap());
        assert!(!locks.release(&handle).await.unwrap());
        assert!(!locks.release_instance("i-002").await.unwrap());
    }

    #[tokio::test]
    async fn store_error_propagates() {
        let store = Arc::new(MemoryParamStore::new());
        store.fail_all(true);
        let locks = manager(store);

        match locks.try_acquire("i-003").await {
            Err(ContainmentError::Store(_)) => {}
            other => panic!("expected Store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn locks_are_per_instance() {
        let store = Arc::new(MemoryParamStore::new());
        let locks = manager(store);

        locks.try_acquire("i-004").await.unwrap();
        assert!(locks.try_acquire("i-005").await.is_ok());
    }
}
