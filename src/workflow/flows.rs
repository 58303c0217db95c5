use chrono::Local;
use log::{error, info};
use std::collections::HashSet;
use std::thread::sleep;
use std::time::Duration;

use crate::common::errors::RunError;
use crate::table::ledger::JobLedger;
use crate::table::store::KeyedLedger;
use crate::utils::fs_utils::Archiver;
use crate::workflow::discovery::{JobDiscovery, JobSource};
use crate::workflow::endpoint::{HealthProbe, select_endpoint};
use crate::workflow::intake::{Catalog, IntakeMachine};
use crate::workflow::translate::PathTranslator;
use crate::workflow::types::{Job, RunSummary};

/// What one run needs to know, independent of any client.
pub struct RunPlan<'a> {
    pub endpoints: &'a [String],
    pub workflow_id: &'a str,
    pub info_job_name: &'a str,
    pub pacing: Duration,
}

/// One pass: pick an endpoint, discover jobs, take each through intake.
pub struct Orchestrator<'a, S, C, A>
where
    S: KeyedLedger,
    C: Catalog + ?Sized,
    A: Archiver + ?Sized,
{
    plan: RunPlan<'a>,
    translator: &'a PathTranslator,
    ledger: &'a mut JobLedger<S>,
    intake: IntakeMachine<'a, C, A>,
}

impl<'a, S, C, A> Orchestrator<'a, S, C, A>
where
    S: KeyedLedger,
    C: Catalog + ?Sized,
    A: Archiver + ?Sized,
{
    pub fn new(
        plan: RunPlan<'a>,
        translator: &'a PathTranslator,
        ledger: &'a mut JobLedger<S>,
        intake: IntakeMachine<'a, C, A>,
    ) -> Self {
        Self {
            plan,
            translator,
            ledger,
            intake,
        }
    }

    /// `connect` builds the job source for whichever endpoint answered.
    pub fn run<P, J, F>(&mut self, probe: &P, connect: F) -> Result<RunSummary, RunError>
    where
        P: HealthProbe + ?Sized,
        J: JobSource,
        F: FnOnce(&str) -> J,
    {
        let endpoint = select_endpoint(self.plan.endpoints, probe)?;
        let source = connect(&endpoint);

        let discovery = JobDiscovery::new(&source, self.translator, self.plan.info_job_name)
            .discover(self.plan.workflow_id, &*self.ledger)?;

        let mut summary = RunSummary {
            skipped: discovery.skipped,
            ..Default::default()
        };
        info!("{} new job(s) to upload", discovery.jobs.len());

        // A job that fails is eligible again in the ledger but not in this run
        let mut attempted: HashSet<&str> = HashSet::new();
        for job in &discovery.jobs {
            // The same id can be listed twice in one response
            if attempted.contains(job.id.as_str())
                || !self.ledger.is_eligible(&job.id).map_err(RunError::Ledger)?
            {
                info!("Job ID: {} already handled in this run, skipping", job.id);
                summary.skipped.duplicate += 1;
                continue;
            }
            if !attempted.is_empty() {
                sleep(self.plan.pacing);
            }
            attempted.insert(&job.id);
            self.process(job, &mut summary)?;
        }

        Ok(summary)
    }

    fn process(&mut self, job: &Job, summary: &mut RunSummary) -> Result<(), RunError> {
        self.ledger
            .mark_in_flight(&job.id)
            .map_err(RunError::Ledger)?;

        match self.intake.run(job) {
            Ok(record) => {
                self.ledger
                    .mark_succeeded(&job.id)
                    .map_err(RunError::Ledger)?;
                info!(
                    "Job {} finalized as Adstream media {}",
                    job.id, record.resource_id
                );
                summary.uploaded.push(job.file_name.clone());
            }
            Err(failure) => {
                error!(
                    "Adstream media creation failure - Job ID: {}, Filename: {}: {}",
                    job.id, job.file_name, failure
                );
                self.ledger
                    .mark_failed(&job.id, failure.to_string(), Local::now())
                    .map_err(RunError::Ledger)?;
                summary.failed.push(job.file_name.clone());
            }
        }
        Ok(())
    }
}
