//! Embedded parameter store.
//!
//! Single-host stand-in for the shared key/value store the lock entries and
//! the quarantine group id live in. Implements the [`ParamStore`] seam so the
//! core never knows whether it is talking to redb or a remote store.

use anyhow::Result;
use async_trait::async_trait;
use lockdown_traits::ParamStore;
use redb::{Database, TableDefinition};
use std::sync::Arc;

use crate::table::RawTable;

const PARAMS_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("params");

#[derive(Debug, Clone)]
pub struct ParamStorage {
    db: Arc<Database>,
}

impl ParamStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(PARAMS_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        match RawTable::get(self, key)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list_prefix(prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }
}

impl RawTable for ParamStorage {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]> = PARAMS_TABLE;

    fn db(&self) -> &Arc<Database> {
        &self.db
    }
}

#[async_trait]
impl ParamStore for ParamStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_string(key)
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        RawTable::put(self, key, value.as_bytes())
    }

    async fn put_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        RawTable::put_if_absent(self, key, value.as_bytes())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        RawTable::delete(self, key)
    }
}
