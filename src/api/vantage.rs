use anyhow::{Context, Result};
use log::{debug, error};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::workflow::discovery::{JobSource, JobSummary, JobVariable};
use crate::workflow::endpoint::HealthProbe;

#[derive(Debug, Deserialize)]
struct DomainOnline {
    #[serde(rename = "Online")]
    online: bool,
}

#[derive(Debug, Deserialize)]
struct WorkflowJobs {
    #[serde(rename = "Jobs", default)]
    jobs: Vec<JobSummary>,
}

#[derive(Debug, Deserialize)]
struct JobOutputs {
    #[serde(rename = "Labels", default)]
    labels: Vec<OutputLabel>,
}

#[derive(Debug, Deserialize)]
struct OutputLabel {
    #[serde(rename = "Params", default)]
    params: Vec<JobVariable>,
}

fn root_uri(endpoint: &str, port: u16) -> String {
    format!("http://{}:{}", endpoint, port)
}

/// Vantage SDK REST service on one host.
pub struct VantageClient {
    http: Client,
    root: String,
}

impl VantageClient {
    pub fn new(http: Client, endpoint: &str, port: u16) -> Self {
        Self {
            http,
            root: root_uri(endpoint, port),
        }
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.root, path);
        debug!("GET {}", url);
        self.http
            .get(&url)
            .send()
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?
            .json::<T>()
            .with_context(|| format!("unexpected response body from {}", url))
    }
}

impl JobSource for VantageClient {
    fn workflow_jobs(&self, workflow_id: &str) -> Result<Vec<JobSummary>> {
        let listing: WorkflowJobs = self.get_json(&format!("/Rest/workflows/{}/jobs", workflow_id))?;
        Ok(listing.jobs)
    }

    fn job_outputs(&self, job_id: &str) -> Result<Vec<JobVariable>> {
        let outputs: JobOutputs = self.get_json(&format!("/Rest/jobs/{}/outputs", job_id))?;
        Ok(outputs
            .labels
            .into_iter()
            .flat_map(|label| label.params)
            .collect())
    }
}

/// Checks `/REST/Domain/Online` on a candidate host.
pub struct VantageProbe {
    http: Client,
    port: u16,
}

impl VantageProbe {
    pub fn new(http: Client, port: u16) -> Self {
        Self { http, port }
    }

    fn check(&self, endpoint: &str) -> Result<bool> {
        let url = format!("{}/REST/Domain/Online", root_uri(endpoint, self.port));
        let status: DomainOnline = self.http.get(&url).send()?.error_for_status()?.json()?;
        Ok(status.online)
    }
}

impl HealthProbe for VantageProbe {
    fn is_healthy(&self, endpoint: &str) -> bool {
        match self.check(endpoint) {
            Ok(online) => online,
            Err(err) => {
                error!("Exception raised on API check for endpoint {}: {:#}", endpoint, err);
                false
            }
        }
    }
}
