//! Byte-level redb table shared by the typed storage wrappers.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

/// Common CRUD over one string-keyed redb table.
///
/// Implementors specify the table definition and the database handle; the
/// conditional put runs inside a single write transaction, which is what
/// makes lock acquisition atomic.
pub trait RawTable: Send + Sync {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]>;

    fn db(&self) -> &Arc<Database>;

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(Self::TABLE)?;
            table.insert(key, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Create-if-absent in one write transaction. Returns false when the key
    /// already exists, leaving the stored value untouched.
    fn put_if_absent(&self, key: &str, data: &[u8]) -> Result<bool> {
        let write_txn = self.db().begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(Self::TABLE)?;
            let exists = table.get(key)?.is_some();
            if !exists {
                table.insert(key, data)?;
            }
            !exists
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;

        if let Some(value) = table.get(key)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Delete by key, returns true if it existed.
    fn delete(&self, key: &str) -> Result<bool> {
        let write_txn = self.db().begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(Self::TABLE)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// List entries whose key starts with `prefix`, as (key, data) pairs.
    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;

        let mut items = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            let key_str = key.value();
            if key_str.starts_with(prefix) {
                items.push((key_str.to_string(), value.value().to_vec()));
            }
        }

        Ok(items)
    }
}
