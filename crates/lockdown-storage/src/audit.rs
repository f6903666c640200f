//! Persisted per-session audit log.

use anyhow::Result;
use lockdown_models::AuditRecord;
use redb::{Database, TableDefinition};
use std::sync::Arc;

use crate::table::RawTable;

const AUDIT_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("audit_log");

/// Append-only audit storage, keyed `{instance_id}/{record_id}` so per-
/// instance history is a prefix scan.
#[derive(Debug, Clone)]
pub struct AuditLogStorage {
    db: Arc<Database>,
}

impl AuditLogStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(AUDIT_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let key = format!("{}/{}", record.instance_id, record.id);
        let bytes = serde_json::to_vec(record)?;
        self.put(&key, &bytes)
    }

    pub fn list_for_instance(&self, instance_id: &str) -> Result<Vec<AuditRecord>> {
        let prefix = format!("{instance_id}/");
        let mut records = Vec::new();
        for (_, bytes) in self.list_prefix(&prefix)? {
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }
}

impl RawTable for AuditLogStorage {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]> = AUDIT_TABLE;

    fn db(&self) -> &Arc<Database> {
        &self.db
    }
}
