use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::rc::Rc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use adstream_uploader::common::errors::RunError;
use adstream_uploader::config::PathRoot;
use adstream_uploader::table::ledger::{JobLedger, LedgerEntry, LedgerState};
use adstream_uploader::table::store::{KeyedLedger, RedbStore};
use adstream_uploader::utils::fs_utils::Archiver;
use adstream_uploader::workflow::discovery::{JobSource, JobSummary, JobVariable};
use adstream_uploader::workflow::endpoint::HealthProbe;
use adstream_uploader::workflow::flows::{Orchestrator, RunPlan};
use adstream_uploader::workflow::intake::{Catalog, CatalogResponse, IntakeMachine, RegisteredMedia};
use adstream_uploader::workflow::translate::PathTranslator;
use adstream_uploader::workflow::types::RunSummary;

const WORKFLOW: &str = "wf-adstream";
const INFO_JOB: &str = "_Info for AdStream Uploads";

#[derive(Clone, Default)]
struct FakeVantage {
    jobs: Vec<JobSummary>,
    outputs: HashMap<String, Vec<JobVariable>>,
}

impl FakeVantage {
    fn with_job(mut self, id: &str, source_path: &str) -> Self {
        self.jobs.push(JobSummary {
            id: id.into(),
            name: format!("render {}", id),
            state: 5,
        });
        let file_name = source_path.rsplit('\\').next().unwrap_or_default();
        self.outputs.insert(
            id.into(),
            vec![
                JobVariable {
                    name: "File Path".into(),
                    value: source_path.into(),
                },
                JobVariable {
                    name: "File Name".into(),
                    value: file_name.into(),
                },
            ],
        );
        self
    }
}

impl JobSource for FakeVantage {
    fn workflow_jobs(&self, workflow_id: &str) -> Result<Vec<JobSummary>> {
        assert_eq!(workflow_id, WORKFLOW);
        let mut jobs = vec![JobSummary {
            id: "info".into(),
            name: INFO_JOB.into(),
            state: 5,
        }];
        jobs.extend(self.jobs.iter().cloned());
        Ok(jobs)
    }

    fn job_outputs(&self, job_id: &str) -> Result<Vec<JobVariable>> {
        self.outputs
            .get(job_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown job {}", job_id))
    }
}

/// Upload succeeds unless the file name is listed in `reject_upload`.
#[derive(Default)]
struct FakeAdstream {
    reject_upload: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl Catalog for FakeAdstream {
    fn register(&self, folder_id: &str, file_name: &str) -> Result<Vec<RegisteredMedia>> {
        self.calls.borrow_mut().push(format!("register {}", file_name));
        Ok(vec![RegisteredMedia {
            id: format!("res-{}", file_name),
            url: format!("https://upload.example/{}/{}", folder_id, file_name),
            reference: String::new(),
            storage_id: "storage-1".into(),
            status: "succeeded".into(),
            filename: file_name.into(),
        }])
    }

    fn upload(&self, upload_target: &str, _bytes: Vec<u8>) -> Result<u16> {
        self.calls.borrow_mut().push(format!("upload {}", upload_target));
        let rejected = self
            .reject_upload
            .iter()
            .any(|name| upload_target.ends_with(name.as_str()));
        Ok(if rejected { 500 } else { 200 })
    }

    fn finalize(&self, _folder_id: &str, resource_id: &str, _file_name: &str) -> Result<CatalogResponse> {
        self.calls.borrow_mut().push(format!("finalize {}", resource_id));
        Ok(CatalogResponse {
            status: 201,
            body: serde_json::json!({ "_id": resource_id }),
        })
    }
}

#[derive(Default)]
struct RecordingArchiver {
    moved: RefCell<Vec<PathBuf>>,
}

impl Archiver for RecordingArchiver {
    fn archive(&self, source: &Path) -> Result<PathBuf> {
        self.moved.borrow_mut().push(source.to_path_buf());
        Ok(source.with_extension("archived"))
    }
}

/// In-memory ledger store that a fake catalog can look into mid-run.
#[derive(Clone, Default)]
struct SharedStore {
    entries: Rc<RefCell<BTreeMap<String, LedgerEntry>>>,
}

impl KeyedLedger for SharedStore {
    fn get(&self, job_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self.entries.borrow().get(job_id).cloned())
    }

    fn put(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(entry.job_id.clone(), entry.clone());
        Ok(())
    }

    fn iterate(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.borrow().values().cloned().collect())
    }

    fn remove(&mut self, job_id: &str) -> Result<bool> {
        Ok(self.entries.borrow_mut().remove(job_id).is_some())
    }
}

/// Records the ledger state of `job_id` each time the catalog is touched.
struct LedgerWatchingCatalog {
    inner: FakeAdstream,
    store: SharedStore,
    job_id: &'static str,
    observed: RefCell<Vec<(String, Option<LedgerState>)>>,
}

impl LedgerWatchingCatalog {
    fn observe(&self, call: &str) {
        let state = self.store.get(self.job_id).unwrap().map(|e| e.state);
        self.observed.borrow_mut().push((call.to_string(), state));
    }
}

impl Catalog for LedgerWatchingCatalog {
    fn register(&self, folder_id: &str, file_name: &str) -> Result<Vec<RegisteredMedia>> {
        self.observe("register");
        self.inner.register(folder_id, file_name)
    }

    fn upload(&self, upload_target: &str, bytes: Vec<u8>) -> Result<u16> {
        self.observe("upload");
        self.inner.upload(upload_target, bytes)
    }

    fn finalize(&self, folder_id: &str, resource_id: &str, file_name: &str) -> Result<CatalogResponse> {
        self.observe("finalize");
        self.inner.finalize(folder_id, resource_id, file_name)
    }
}

struct Probe {
    healthy: HashSet<&'static str>,
    probed: RefCell<Vec<String>>,
}

impl Probe {
    fn healthy(hosts: &[&'static str]) -> Self {
        Self {
            healthy: hosts.iter().copied().collect(),
            probed: RefCell::new(Vec::new()),
        }
    }
}

impl HealthProbe for Probe {
    fn is_healthy(&self, endpoint: &str) -> bool {
        self.probed.borrow_mut().push(endpoint.to_string());
        self.healthy.contains(endpoint)
    }
}

struct Harness {
    dir: tempfile::TempDir,
    translator: PathTranslator,
    endpoints: Vec<String>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        for folder in ["ShowA", "Promos", "_Staging"] {
            fs::create_dir_all(media.join(folder)).unwrap();
        }
        let translator = PathTranslator::new(
            vec![PathRoot {
                prefix: "T:\\".into(),
                mount: media.to_string_lossy().into_owned(),
            }],
            "_Staging",
            BTreeMap::from([
                ("ShowA".to_string(), "folder-show-a".to_string()),
                ("Promos".to_string(), "folder-promos".to_string()),
            ]),
        );
        Self {
            dir,
            translator,
            endpoints: vec!["vantage01".into(), "vantage02".into(), "vantage03".into()],
        }
    }

    /// Put a file where `T:\{folder}\{name}` resolves to.
    fn render(&self, folder: &str, name: &str) -> String {
        fs::write(self.dir.path().join("media").join(folder).join(name), b"essence").unwrap();
        format!("T:\\{}\\{}", folder, name)
    }

    fn ledger(&self) -> JobLedger<RedbStore> {
        JobLedger::open(RedbStore::open(self.dir.path().join("db").join("ledger.redb")).unwrap())
            .unwrap()
    }

    fn run(
        &self,
        vantage: &FakeVantage,
        catalog: &FakeAdstream,
        archiver: &RecordingArchiver,
        probe: &Probe,
    ) -> (Result<RunSummary, RunError>, Option<String>) {
        let mut ledger = self.ledger();
        let plan = RunPlan {
            endpoints: &self.endpoints,
            workflow_id: WORKFLOW,
            info_job_name: INFO_JOB,
            pacing: Duration::ZERO,
        };
        let intake = IntakeMachine::new(catalog, archiver, None);
        let mut connected = None;
        let result = Orchestrator::new(plan, &self.translator, &mut ledger, intake).run(
            probe,
            |endpoint| {
                connected = Some(endpoint.to_string());
                vantage.clone()
            },
        );
        (result, connected)
    }
}

#[test]
fn successful_intake_uploads_and_archives_once() {
    let h = Harness::new();
    let vantage = FakeVantage::default().with_job("job-1", &h.render("ShowA", "clip.mov"));
    let catalog = FakeAdstream::default();
    let archiver = RecordingArchiver::default();

    let (result, _) = h.run(&vantage, &catalog, &archiver, &Probe::healthy(&["vantage01"]));
    let summary = result.unwrap();

    assert_eq!(summary.uploaded, vec!["clip.mov"]);
    assert!(summary.failed.is_empty());
    assert_eq!(archiver.moved.borrow().len(), 1);
    assert!(archiver.moved.borrow()[0].ends_with("ShowA/clip.mov"));

    let entry = h.ledger().get("job-1").unwrap().unwrap();
    assert_eq!(entry.state, LedgerState::Seen);
}

#[test]
fn transfer_failure_marks_job_failed_without_archiving() {
    let h = Harness::new();
    let vantage = FakeVantage::default().with_job("job-1", &h.render("ShowA", "clip.mov"));
    let catalog = FakeAdstream {
        reject_upload: HashSet::from(["clip.mov".to_string()]),
        ..Default::default()
    };
    let archiver = RecordingArchiver::default();

    let (result, _) = h.run(&vantage, &catalog, &archiver, &Probe::healthy(&["vantage01"]));
    let summary = result.unwrap();

    assert!(summary.uploaded.is_empty());
    assert_eq!(summary.failed, vec!["clip.mov"]);
    assert!(archiver.moved.borrow().is_empty());
    assert!(!catalog.calls.borrow().iter().any(|c| c.starts_with("finalize")));

    let ledger = h.ledger();
    let entry = ledger.get("job-1").unwrap().unwrap();
    assert_eq!(entry.state, LedgerState::Failed);
    assert!(entry.reason.unwrap().contains("transfer failed"));
    assert!(ledger.is_eligible("job-1").unwrap());
}

#[test]
fn one_failure_does_not_stop_the_run() {
    let h = Harness::new();
    let vantage = FakeVantage::default()
        .with_job("job-1", &h.render("ShowA", "bad.mov"))
        .with_job("job-2", &h.render("Promos", "good.mov"));
    let catalog = FakeAdstream {
        reject_upload: HashSet::from(["bad.mov".to_string()]),
        ..Default::default()
    };
    let archiver = RecordingArchiver::default();

    let (result, _) = h.run(&vantage, &catalog, &archiver, &Probe::healthy(&["vantage01"]));
    let summary = result.unwrap();

    assert_eq!(summary.failed, vec!["bad.mov"]);
    assert_eq!(summary.uploaded, vec!["good.mov"]);
}

#[test]
fn second_run_skips_succeeded_and_retries_failed() {
    let h = Harness::new();
    let vantage = FakeVantage::default()
        .with_job("job-ok", &h.render("ShowA", "ok.mov"))
        .with_job("job-flaky", &h.render("ShowA", "flaky.mov"));
    let probe = Probe::healthy(&["vantage01"]);

    let first = FakeAdstream {
        reject_upload: HashSet::from(["flaky.mov".to_string()]),
        ..Default::default()
    };
    let (result, _) = h.run(&vantage, &first, &RecordingArchiver::default(), &probe);
    let summary = result.unwrap();
    assert_eq!(summary.uploaded, vec!["ok.mov"]);
    assert_eq!(summary.failed, vec!["flaky.mov"]);

    let second = FakeAdstream::default();
    let (result, _) = h.run(&vantage, &second, &RecordingArchiver::default(), &probe);
    let summary = result.unwrap();
    assert_eq!(summary.uploaded, vec!["flaky.mov"]);
    assert_eq!(summary.skipped.duplicate, 1);
    assert!(!second.calls.borrow().iter().any(|c| c.contains("ok.mov")));
}

#[test]
fn staging_job_is_never_submitted() {
    let h = Harness::new();
    let vantage = FakeVantage::default()
        .with_job("job-stage", &h.render("_Staging", "wip.mov"))
        .with_job("job-unmapped", "T:\\Unknown\\orphan.mov");
    let catalog = FakeAdstream::default();

    let (result, _) = h.run(
        &vantage,
        &catalog,
        &RecordingArchiver::default(),
        &Probe::healthy(&["vantage01"]),
    );
    let summary = result.unwrap();

    assert!(summary.uploaded.is_empty());
    assert_eq!(summary.skipped.staging, 1);
    assert_eq!(summary.skipped.unmapped, 1);
    assert!(catalog.calls.borrow().is_empty());
    assert!(h.ledger().get("job-stage").unwrap().is_none());
}

#[test]
fn duplicate_listing_is_processed_once() {
    let h = Harness::new();
    let path = h.render("ShowA", "clip.mov");
    let vantage = FakeVantage::default()
        .with_job("job-1", &path)
        .with_job("job-1", &path);
    let catalog = FakeAdstream::default();

    let (result, _) = h.run(
        &vantage,
        &catalog,
        &RecordingArchiver::default(),
        &Probe::healthy(&["vantage01"]),
    );
    let summary = result.unwrap();

    assert_eq!(summary.uploaded, vec!["clip.mov"]);
    assert_eq!(summary.skipped.duplicate, 1);
    assert_eq!(
        catalog
            .calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("register"))
            .count(),
        1
    );
}

#[test]
fn first_healthy_endpoint_is_used() {
    let h = Harness::new();
    let vantage = FakeVantage::default();
    let probe = Probe::healthy(&["vantage02", "vantage03"]);

    let (result, connected) = h.run(
        &vantage,
        &FakeAdstream::default(),
        &RecordingArchiver::default(),
        &probe,
    );

    assert!(result.is_ok());
    assert_eq!(connected.as_deref(), Some("vantage02"));
    assert_eq!(*probe.probed.borrow(), vec!["vantage01", "vantage02"]);
}

#[test]
fn no_endpoint_means_no_jobs() {
    let h = Harness::new();
    let vantage = FakeVantage::default().with_job("job-1", &h.render("ShowA", "clip.mov"));
    let catalog = FakeAdstream::default();

    let (result, connected) = h.run(
        &vantage,
        &catalog,
        &RecordingArchiver::default(),
        &Probe::healthy(&[]),
    );

    assert!(matches!(result, Err(RunError::NoEndpoint { .. })));
    assert!(connected.is_none());
    assert!(catalog.calls.borrow().is_empty());
    assert!(h.ledger().get("job-1").unwrap().is_none());
}

#[test]
fn failed_duplicate_listing_is_not_retried_in_the_same_run() {
    let h = Harness::new();
    let path = h.render("ShowA", "clip.mov");
    let vantage = FakeVantage::default()
        .with_job("job-1", &path)
        .with_job("job-1", &path);
    let catalog = FakeAdstream {
        reject_upload: HashSet::from(["clip.mov".to_string()]),
        ..Default::default()
    };

    let (result, _) = h.run(
        &vantage,
        &catalog,
        &RecordingArchiver::default(),
        &Probe::healthy(&["vantage01"]),
    );
    let summary = result.unwrap();

    assert_eq!(summary.failed, vec!["clip.mov"]);
    assert_eq!(summary.skipped.duplicate, 1);
    assert_eq!(
        catalog
            .calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("register"))
            .count(),
        1
    );
    // Still retryable on the next run
    assert!(h.ledger().is_eligible("job-1").unwrap());
}

#[test]
fn ledger_entry_is_in_flight_before_any_catalog_call() {
    let h = Harness::new();
    let vantage = FakeVantage::default().with_job("job-1", &h.render("ShowA", "clip.mov"));
    let store = SharedStore::default();
    let catalog = LedgerWatchingCatalog {
        inner: FakeAdstream::default(),
        store: store.clone(),
        job_id: "job-1",
        observed: RefCell::new(Vec::new()),
    };
    let archiver = RecordingArchiver::default();

    let mut ledger = JobLedger::open(store.clone()).unwrap();
    let plan = RunPlan {
        endpoints: &h.endpoints,
        workflow_id: WORKFLOW,
        info_job_name: INFO_JOB,
        pacing: Duration::ZERO,
    };
    let intake = IntakeMachine::new(&catalog, &archiver, None);
    let summary = Orchestrator::new(plan, &h.translator, &mut ledger, intake)
        .run(&Probe::healthy(&["vantage01"]), |_| vantage.clone())
        .unwrap();

    assert_eq!(summary.uploaded, vec!["clip.mov"]);
    assert_eq!(
        *catalog.observed.borrow(),
        vec![
            ("register".to_string(), Some(LedgerState::InFlight)),
            ("upload".to_string(), Some(LedgerState::InFlight)),
            ("finalize".to_string(), Some(LedgerState::InFlight)),
        ]
    );
    assert_eq!(
        store.get("job-1").unwrap().map(|e| e.state),
        Some(LedgerState::Seen)
    );
}
