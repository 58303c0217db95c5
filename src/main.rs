use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use adstream_uploader::api::adstream::AdstreamClient;
use adstream_uploader::api::auth::Signer;
use adstream_uploader::api::http_client;
use adstream_uploader::api::vantage::{VantageClient, VantageProbe};
use adstream_uploader::bootstrap::setup::{complete_banner, initialize_logger, start_banner};
use adstream_uploader::config::{AppConfig, Credentials};
use adstream_uploader::table::ledger::{JobLedger, LedgerState, retention_cutoff};
use adstream_uploader::table::store::RedbStore;
use adstream_uploader::utils::fs_utils::FsArchiver;
use adstream_uploader::workflow::flows::{Orchestrator, RunPlan};
use adstream_uploader::workflow::intake::IntakeMachine;
use adstream_uploader::workflow::translate::PathTranslator;
use adstream_uploader::workflow::types::RunSummary;

#[derive(Debug, Parser)]
#[command(version, about = "Upload finished Vantage renders to Adstream")]
struct Cli {
    /// Settings file
    #[arg(long, short, env = "ADSTREAM_UPLOADER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover finished jobs and upload them (default)
    Run {
        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Inspect or maintain the job ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Debug, Subcommand)]
enum LedgerAction {
    /// List recorded jobs
    List {
        /// Only failed jobs
        #[arg(long)]
        failed: bool,
    },
    /// Remove entries older than the retention window
    Prune {
        /// Overrides `ledgerRetentionDays`
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)?;
    initialize_logger(config.paths.logs.as_deref())?;

    match cli.command.unwrap_or(Command::Run { json: false }) {
        Command::Run { json } => {
            let summary = upload(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Command::Ledger { action } => ledger_command(&config, action),
    }
}

fn upload(config: &AppConfig) -> Result<RunSummary> {
    start_banner();
    let start_time = Instant::now();

    let credentials = Credentials::from_env()?;
    let http = http_client(config.http_timeout())?;

    let mut ledger = JobLedger::open(RedbStore::open(&config.paths.ledger)?)?;
    let translator = PathTranslator::from_config(config);
    let catalog = AdstreamClient::new(
        http.clone(),
        &config.adstream.base_url,
        Signer::new(credentials),
        config.adstream.subtype.clone(),
    );
    let archiver = FsArchiver::new(&config.paths.archive);
    let probe = VantageProbe::new(http.clone(), config.vantage.port);

    let plan = RunPlan {
        endpoints: &config.vantage.endpoints,
        workflow_id: &config.vantage.workflow_id,
        info_job_name: &config.vantage.info_job_name,
        pacing: config.pacing(),
    };
    let intake = IntakeMachine::new(
        &catalog,
        &archiver,
        config.adstream.register_folder_id.as_deref(),
    );

    let port = config.vantage.port;
    let summary = Orchestrator::new(plan, &translator, &mut ledger, intake)
        .run(&probe, |endpoint| VantageClient::new(http.clone(), endpoint, port))
        .context("upload run aborted")?;

    info!(duration = &*format!("{:.2?}", start_time.elapsed()); "Uploaded {} file(s), {} failed", summary.uploaded.len(), summary.failed.len());
    if !summary.uploaded.is_empty() {
        info!("Uploaded Files:\n{}", summary.uploaded.join("\n"));
    }
    if !summary.failed.is_empty() {
        error!("Failed Uploads:\n{}", summary.failed.join("\n"));
    }
    let skipped = &summary.skipped;
    info!(
        "Skipped {} job(s): {} pending, {} duplicate, {} incomplete, {} staging, {} unmapped",
        skipped.total(),
        skipped.pending,
        skipped.duplicate,
        skipped.incomplete,
        skipped.staging,
        skipped.unmapped
    );
    complete_banner();
    Ok(summary)
}

fn ledger_command(config: &AppConfig, action: LedgerAction) -> Result<()> {
    let mut ledger = JobLedger::open(RedbStore::open(&config.paths.ledger)?)?;
    match action {
        LedgerAction::List { failed } => {
            for entry in ledger.entries()? {
                if !failed || entry.state == LedgerState::Failed {
                    println!("{}", entry);
                }
            }
        }
        LedgerAction::Prune { days } => {
            let days = days.unwrap_or(config.ledger_retention_days);
            let cutoff = retention_cutoff(Local::now(), days)?;
            let removed = ledger.prune(cutoff)?;
            info!("Pruned {} ledger entries older than {} days", removed, days);
        }
    }
    Ok(())
}
