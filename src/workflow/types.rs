use serde::Serialize;
use std::path::PathBuf;

/// Where a job's file lives locally and which Adstream folder receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub local_path: PathBuf,
    pub container_id: String,
}

/// A completed Vantage job ready for intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub source_path: String,
    pub file_name: String,
    pub folder_key: String,
    pub destination: Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registered,
    Transferred,
    Finalized,
    Failed,
}

/// State threaded through register, transfer and finalize for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRecord {
    pub resource_id: String,
    pub upload_target: String,
    pub destination_folder_id: String,
    pub file_name: String,
    pub phase: Phase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipTally {
    /// Not yet in the completed state
    pub pending: usize,
    pub duplicate: usize,
    pub incomplete: usize,
    pub staging: usize,
    pub unmapped: usize,
}

impl SkipTally {
    pub fn total(&self) -> usize {
        self.pending + self.duplicate + self.incomplete + self.staging + self.unmapped
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: SkipTally,
}
