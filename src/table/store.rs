use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::fs;
use std::path::Path;

use crate::table::ledger::LedgerEntry;

// Job id -> serde_json encoded LedgerEntry
pub const LEDGER_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("job_ledger");

/// Durable store keyed by job id.
pub trait KeyedLedger {
    fn get(&self, job_id: &str) -> Result<Option<LedgerEntry>>;

    /// Insert or replace. Must be durable when it returns.
    fn put(&mut self, entry: &LedgerEntry) -> Result<()>;

    fn iterate(&self) -> Result<Vec<LedgerEntry>>;

    fn remove(&mut self, job_id: &str) -> Result<bool>;
}

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create ledger directory {:?}", parent))?;
        }
        let db = Database::create(path)
            .with_context(|| format!("failed to open ledger database {:?}", path))?;

        // Create the table up front so read transactions never miss it
        let txn = db.begin_write()?;
        let _ = txn.open_table(LEDGER_TABLE)?;
        txn.commit()?;

        Ok(Self { db })
    }
}

impl KeyedLedger for RedbStore {
    fn get(&self, job_id: &str) -> Result<Option<LedgerEntry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LEDGER_TABLE)?;
        match table.get(job_id)? {
            Some(bytes) => {
                let entry = serde_json::from_slice(bytes.value())
                    .with_context(|| format!("corrupt ledger entry for job {}", job_id))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, entry: &LedgerEntry) -> Result<()> {
        let json_bytes = serde_json::to_vec(entry)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(LEDGER_TABLE)?;
            table.insert(entry.job_id.as_str(), json_bytes.as_slice())?;
        }
        txn.commit()
            .with_context(|| format!("failed to commit ledger entry for job {}", entry.job_id))?;
        Ok(())
    }

    fn iterate(&self) -> Result<Vec<LedgerEntry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LEDGER_TABLE)?;
        let mut entries = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            let entry: LedgerEntry = serde_json::from_slice(value.value())
                .with_context(|| format!("corrupt ledger entry for job {}", key.value()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn remove(&mut self, job_id: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(LEDGER_TABLE)?;
            table.remove(job_id)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }
}
