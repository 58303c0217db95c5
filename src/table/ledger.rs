//! Job ledger: which Vantage jobs have been seen, which succeeded, which
//! failed and may be retried on a later run.
//!
//! Every job is written as `InFlight` before the first catalog call is made.
//! Opening the ledger turns any `InFlight` left over from an interrupted run
//! into `Failed`, so a crash mid-intake is retried instead of forgotten.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::table::store::KeyedLedger;

pub const INTERRUPTED_REASON: &str = "interrupted before completion";

/// Oldest timestamp kept when retaining `days` days back from `now`.
pub fn retention_cutoff(now: DateTime<Local>, days: i64) -> Result<DateTime<Local>> {
    if days < 1 {
        bail!("ledger retention must be at least 1 day, got {}", days);
    }
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .with_context(|| format!("ledger retention of {} days is out of range", days))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LedgerState {
    InFlight,
    Seen,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub job_id: String,
    pub state: LedgerState,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LedgerEntry {
    fn new(job_id: &str, state: LedgerState, at: DateTime<Local>) -> Self {
        Self {
            job_id: job_id.to_string(),
            state,
            timestamp_ms: at.timestamp_millis(),
            reason: None,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp_ms).single()
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = self
            .timestamp()
            .map(|t| t.format("%Y-%m-%d, %H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp_ms.to_string());
        match self.state {
            LedgerState::Seen => write!(f, "{}", self.job_id),
            LedgerState::InFlight => write!(f, "{} (in flight since {})", self.job_id, when),
            LedgerState::Failed => write!(
                f,
                "[ {} - Upload Failed for job id: {} ] {}",
                when,
                self.job_id,
                self.reason.as_deref().unwrap_or("")
            ),
        }
    }
}

pub struct JobLedger<S: KeyedLedger> {
    store: S,
}

impl<S: KeyedLedger> JobLedger<S> {
    /// Wrap a store and recover entries stranded by an interrupted run.
    pub fn open(store: S) -> Result<Self> {
        let mut ledger = Self { store };
        let recovered = ledger.recover_interrupted(Local::now())?;
        if recovered > 0 {
            warn!(
                "{} job(s) were interrupted during a previous run, marked for retry",
                recovered
            );
        }
        Ok(ledger)
    }

    pub fn is_eligible(&self, job_id: &str) -> Result<bool> {
        Ok(match self.store.get(job_id)? {
            None => true,
            Some(entry) => entry.state == LedgerState::Failed,
        })
    }

    /// Write-ahead marker; durable before it returns.
    pub fn mark_in_flight(&mut self, job_id: &str) -> Result<()> {
        self.store
            .put(&LedgerEntry::new(job_id, LedgerState::InFlight, Local::now()))
    }

    pub fn mark_failed(
        &mut self,
        job_id: &str,
        reason: impl Into<String>,
        at: DateTime<Local>,
    ) -> Result<()> {
        let mut entry = LedgerEntry::new(job_id, LedgerState::Failed, at);
        entry.reason = Some(reason.into());
        self.store.put(&entry)?;
        info!("Ledger: {}", entry);
        Ok(())
    }

    pub fn mark_succeeded(&mut self, job_id: &str) -> Result<()> {
        self.store
            .put(&LedgerEntry::new(job_id, LedgerState::Seen, Local::now()))
    }

    pub fn get(&self, job_id: &str) -> Result<Option<LedgerEntry>> {
        self.store.get(job_id)
    }

    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.store.iterate()?;
        entries.sort_by_key(|e| e.timestamp_ms);
        Ok(entries)
    }

    /// Drop entries last touched before `cutoff`. Returns how many went.
    pub fn prune(&mut self, cutoff: DateTime<Local>) -> Result<usize> {
        // A cutoff in the future would forget every delivered job
        if cutoff >= Local::now() {
            bail!("prune cutoff {} is not in the past", cutoff.format("%Y-%m-%d %H:%M:%S"));
        }
        let cutoff_ms = cutoff.timestamp_millis();
        let stale: Vec<String> = self
            .store
            .iterate()?
            .into_iter()
            .filter(|e| e.timestamp_ms < cutoff_ms && e.state != LedgerState::InFlight)
            .map(|e| e.job_id)
            .collect();

        let mut removed = 0;
        for job_id in stale {
            if self.store.remove(&job_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn recover_interrupted(&mut self, at: DateTime<Local>) -> Result<usize> {
        let stranded: Vec<String> = self
            .store
            .iterate()?
            .into_iter()
            .filter(|e| e.state == LedgerState::InFlight)
            .map(|e| e.job_id)
            .collect();
        for job_id in &stranded {
            self.mark_failed(job_id, INTERRUPTED_REASON, at)?;
        }
        Ok(stranded.len())
    }
}
