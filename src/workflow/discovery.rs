//! Finds completed jobs in the tracked Vantage workflow and turns their output
//! variables into [`Job`]s.

use anyhow::Result;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;

use crate::common::errors::RunError;
use crate::common::{JOB_STATE_COMPLETE, VAR_FILE_NAME, VAR_FILE_PATH};
use crate::table::ledger::JobLedger;
use crate::table::store::KeyedLedger;
use crate::workflow::translate::{PathTranslator, Skip};
use crate::workflow::types::{Job, SkipTally};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    #[serde(rename = "Identifier")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "State")]
    pub state: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobVariable {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

impl JobVariable {
    pub fn text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

pub trait JobSource {
    fn workflow_jobs(&self, workflow_id: &str) -> Result<Vec<JobSummary>>;

    fn job_outputs(&self, job_id: &str) -> Result<Vec<JobVariable>>;
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub jobs: Vec<Job>,
    pub skipped: SkipTally,
}

pub struct JobDiscovery<'a, J: JobSource + ?Sized> {
    source: &'a J,
    translator: &'a PathTranslator,
    info_job_name: &'a str,
}

impl<'a, J: JobSource + ?Sized> JobDiscovery<'a, J> {
    pub fn new(source: &'a J, translator: &'a PathTranslator, info_job_name: &'a str) -> Self {
        Self {
            source,
            translator,
            info_job_name,
        }
    }

    pub fn discover<S: KeyedLedger>(
        &self,
        workflow_id: &str,
        ledger: &JobLedger<S>,
    ) -> Result<Discovery, RunError> {
        let listed = self
            .source
            .workflow_jobs(workflow_id)
            .map_err(RunError::Discovery)?;
        info!("{} job(s) listed in workflow {}", listed.len(), workflow_id);

        let mut discovery = Discovery::default();
        for summary in listed {
            if summary.name == self.info_job_name {
                continue;
            }
            if summary.state != JOB_STATE_COMPLETE {
                debug!("Job {} in state {}, not ready", summary.id, summary.state);
                discovery.skipped.pending += 1;
                continue;
            }
            if !ledger.is_eligible(&summary.id).map_err(RunError::Ledger)? {
                info!("Job ID: {} is a duplicate, skipping", summary.id);
                discovery.skipped.duplicate += 1;
                continue;
            }

            match self.build_job(&summary.id) {
                Ok(job) => discovery.jobs.push(job),
                Err(JobSkip::Incomplete(why)) => {
                    info!("Job {} skipped: {}", summary.id, why);
                    discovery.skipped.incomplete += 1;
                }
                Err(JobSkip::Path(Skip::Staging)) => {
                    info!("Job {} output is in the staging folder, skipping", summary.id);
                    discovery.skipped.staging += 1;
                }
                Err(JobSkip::Path(skip @ Skip::Unmapped { .. })) => {
                    warn!("Job {} skipped: {}", summary.id, skip);
                    discovery.skipped.unmapped += 1;
                }
                Err(JobSkip::Path(skip @ Skip::Malformed)) => {
                    warn!("Job {} skipped: {}", summary.id, skip);
                    discovery.skipped.incomplete += 1;
                }
            }
        }
        Ok(discovery)
    }

    fn build_job(&self, job_id: &str) -> Result<Job, JobSkip> {
        let variables = self.source.job_outputs(job_id).map_err(|err| {
            JobSkip::Incomplete(format!("could not read output variables: {:#}", err))
        })?;
        if variables.is_empty() {
            return Err(JobSkip::Incomplete("no output variables yet".into()));
        }

        let vars: HashMap<&str, String> = variables
            .iter()
            .map(|v| (v.name.as_str(), v.text()))
            .collect();
        debug!("Variables for Job ID {}: {:?}", job_id, vars);

        let source_path = vars
            .get(VAR_FILE_PATH)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| JobSkip::Incomplete(format!("missing {:?} variable", VAR_FILE_PATH)))?
            .clone();

        let translation = self
            .translator
            .translate(&source_path)
            .map_err(JobSkip::Path)?;

        let file_name = vars
            .get(VAR_FILE_NAME)
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or(translation.file_name);

        Ok(Job {
            id: job_id.to_string(),
            source_path,
            file_name,
            folder_key: translation.folder_key,
            destination: translation.destination,
        })
    }
}

enum JobSkip {
    Incomplete(String),
    Path(Skip),
}
