pub mod audit;
pub mod table;

mod params;

use anyhow::Result;
use redb::Database;
use std::sync::Arc;

pub use audit::AuditLogStorage;
pub use params::ParamStorage;
pub use table::RawTable;

/// Embedded storage shared by the orchestrator and the approval surface.
pub struct Storage {
    pub params: ParamStorage,
    pub audit: AuditLogStorage,
}

impl Storage {
    pub fn new(path: &str) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);

        let params = ParamStorage::new(db.clone())?;
        let audit = AuditLogStorage::new(db)?;

        Ok(Self { params, audit })
    }
}
