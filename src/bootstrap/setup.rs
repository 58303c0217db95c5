//! Startup tasks
//!
//! Includes:
//! - Logger initialization (stderr or dated log file)
//! - Run banners

use anstyle::{AnsiColor, Style};
use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Target, WriteStyle};
use log::info;
use log::kv::Key;
use std::{fs, io::Write, path::Path};

use crate::common::LOG_FILE_PREFIX;

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

/// Initialize the logger. With `log_dir` set, lines go to
/// `{log_dir}/adstream_upload_YYYYMMDD.log` without colour.
pub fn initialize_logger(log_dir: Option<&Path>) -> Result<()> {
    let mut builder = Builder::new();

    match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {:?}", dir))?;
            let path = dir.join(format!(
                "{}_{}.log",
                LOG_FILE_PREFIX,
                Local::now().format("%Y%m%d")
            ));
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {:?}", path))?;
            builder
                .write_style(WriteStyle::Never)
                .target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.write_style(WriteStyle::Auto).target(Target::Stderr);
        }
    }

    builder
        .format(|buf, record| {
            let dim = Style::new().dimmed();
            let level_style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{dim}{}{dim:#} {level_style}{}{level_style:#} {dim}{}{dim:#}",
                buf.timestamp(),
                record.level(),
                record.target()
            )?;

            let column = duration_column(record);
            let message = record.args().to_string();
            for (i, line) in message.lines().enumerate() {
                if i == 0 {
                    writeln!(buf, "{} {}", column, line)?;
                } else {
                    writeln!(buf, "{:width$}{}", "", line, width = DURATION_WIDTH + 1)?;
                }
            }
            Ok(())
        })
        // INFO globally, WARN+ for the HTTP stack; RUST_LOG overrides
        .filter(None, log::LevelFilter::Info)
        .filter(Some("reqwest"), log::LevelFilter::Warn)
        .filter(Some("hyper"), log::LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .context("logger already initialized")?;

    Ok(())
}

const DURATION_WIDTH: usize = 10;

/// Right-aligned `duration` key-value, or blank padding when absent.
fn duration_column(record: &log::Record) -> String {
    match record.key_values().get(Key::from("duration")) {
        Some(value) => {
            let cyan = Style::new().fg_color(Some(AnsiColor::Cyan.into()));
            format!("{cyan}{:>width$}{cyan:#}", value.to_string(), width = DURATION_WIDTH)
        }
        None => " ".repeat(DURATION_WIDTH),
    }
}

// ────────────────────────────────────────────────────────────────
// Banners
// ────────────────────────────────────────────────────────────────

const RULE: &str =
    "==================================================================================";

pub fn start_banner() {
    info!(
        "{}\n    AdStream Upload - Start - {}\n{}",
        RULE,
        Local::now().format("%A, %d. %B %Y %I:%M%p"),
        RULE
    );
}

pub fn complete_banner() {
    info!(
        "{}\n    AdStream Upload - Complete - {}\n{}",
        RULE,
        Local::now().format("%A, %d. %B %Y %I:%M%p"),
        RULE
    );
}
