//! Runtime configuration.
//!
//! The settings file is JSON. API credentials never live in it: they are read
//! from the environment (optionally seeded by a `.env` file).

use anyhow::{Context, Result, bail};
use dotenv::dotenv;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_INFO_JOB_NAME, DEFAULT_MEDIA_SUBTYPE, DEFAULT_PACING_SECS,
    DEFAULT_RETENTION_DAYS, DEFAULT_STAGING_FOLDER, VANTAGE_PORT,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub vantage: VantageConfig,
    pub adstream: AdstreamConfig,
    pub paths: PathsConfig,
    /// Pause between two intake attempts, in seconds
    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: u64,
    /// Ledger entries older than this are removed by `ledger prune`
    #[serde(default = "default_retention_days")]
    pub ledger_retention_days: i64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VantageConfig {
    /// Candidate hosts in priority order
    pub endpoints: Vec<String>,
    #[serde(default = "default_vantage_port")]
    pub port: u16,
    pub workflow_id: String,
    /// Name of the workflow's informational pseudo-job, never uploaded
    #[serde(default = "default_info_job_name")]
    pub info_job_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdstreamConfig {
    pub base_url: String,
    /// When set, placeholders are registered here instead of the mapped folder
    #[serde(default)]
    pub register_folder_id: Option<String>,
    #[serde(default = "default_subtype")]
    pub subtype: String,
    /// Taxonomy folder name -> Adstream folder id
    pub folders: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    pub ledger: PathBuf,
    pub archive: PathBuf,
    #[serde(default)]
    pub logs: Option<PathBuf>,
    /// Source prefixes rewritten onto local mount points
    #[serde(default)]
    pub roots: Vec<PathRoot>,
    #[serde(default = "default_staging_folder")]
    pub staging_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PathRoot {
    /// e.g. `T:\` or `\\isilon\media`
    pub prefix: String,
    /// e.g. `/Volumes/Quantum2`
    pub mount: String,
}

fn default_pacing_secs() -> u64 {
    DEFAULT_PACING_SECS
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_vantage_port() -> u16 {
    VANTAGE_PORT
}

fn default_info_job_name() -> String {
    DEFAULT_INFO_JOB_NAME.to_string()
}

fn default_subtype() -> String {
    DEFAULT_MEDIA_SUBTYPE.to_string()
}

fn default_staging_folder() -> String {
    DEFAULT_STAGING_FOLDER.to_string()
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("invalid config file {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.vantage.endpoints.iter().all(|e| e.trim().is_empty()) {
            bail!("vantage.endpoints must list at least one host");
        }
        if self.vantage.workflow_id.trim().is_empty() {
            bail!("vantage.workflowId must not be empty");
        }
        if self.adstream.base_url.trim().is_empty() {
            bail!("adstream.baseUrl must not be empty");
        }
        if self.ledger_retention_days < 1 {
            bail!("ledgerRetentionDays must be at least 1");
        }
        Ok(())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Adstream API key pair, read from `ADSTREAM_KEY` / `ADSTREAM_SECRET`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        envy::prefixed("ADSTREAM_")
            .from_env::<Credentials>()
            .context("ADSTREAM_KEY and ADSTREAM_SECRET must be set (environment or .env)")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}
