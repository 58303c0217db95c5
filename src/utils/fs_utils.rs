//! File system helpers: reading source media and moving it to the archive.

use anyhow::{Context, Error, Result, bail};
use chrono::Local;
use log::warn;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    thread::sleep,
    time::Duration,
};

use crate::common::MAX_ARCHIVE_ATTEMPTS;

const READ_FAIL_RETRY: usize = 3;
const READ_RETRY_DELAY_MS: u64 = 100;

/// Read a whole file, retrying transient failures (busy network shares).
pub fn read_file_with_retry(path: &Path) -> Result<Vec<u8>> {
    let mut delay = Duration::from_millis(READ_RETRY_DELAY_MS);

    for attempt in 0..=READ_FAIL_RETRY {
        match fs::read(path) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::new(e).context(format!("source file {:?} not found", path)));
            }
            Err(e) if attempt < READ_FAIL_RETRY => {
                warn!(
                    "Attempt {}/{} failed to read {:?}: {}. Retrying in {:?}…",
                    attempt + 1,
                    READ_FAIL_RETRY + 1,
                    path,
                    e,
                    delay,
                );
                sleep(delay);
                delay = delay.checked_mul(2).unwrap_or(delay);
            }
            Err(e) => {
                return Err(Error::new(e).context(format!(
                    "Failed to read file {:?} after {} attempts",
                    path,
                    READ_FAIL_RETRY + 1
                )));
            }
        }
    }

    bail!("failed to read {:?}", path)
}

/// Where finished source files go once Adstream has them.
pub trait Archiver {
    /// Relocate `source`, returning its new path.
    fn archive(&self, source: &Path) -> Result<PathBuf>;
}

pub struct FsArchiver {
    archive_dir: PathBuf,
}

impl FsArchiver {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    fn target_for(&self, source: &Path) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .with_context(|| format!("{:?} has no file name", source))?;
        let target = self.archive_dir.join(file_name);
        if !target.exists() {
            return Ok(target);
        }
        // Same name archived before: keep both
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let name = file_name.to_string_lossy();
        let mut stamped = self.archive_dir.join(format!("{}_{}", stamp, name));
        let mut counter = 1u32;
        while stamped.exists() {
            stamped = self
                .archive_dir
                .join(format!("{}-{}_{}", stamp, counter, name));
            counter += 1;
        }
        Ok(stamped)
    }
}

impl Archiver for FsArchiver {
    fn archive(&self, source: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.archive_dir).with_context(|| {
            format!("failed to create archive directory {:?}", self.archive_dir)
        })?;
        let target = self.target_for(source)?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match move_file(source, &target) {
                Ok(()) => return Ok(target),
                Err(err) if attempts < MAX_ARCHIVE_ATTEMPTS => {
                    warn!(
                        "Failed moving {:?} (attempt {}), retrying in {}ms: {:#}",
                        source,
                        attempts,
                        100 * attempts,
                        err
                    );
                    sleep(Duration::from_millis(100 * attempts));
                }
                Err(err) => {
                    return Err(err).context(format!(
                        "Failed moving {:?} to {:?} after {} attempts",
                        source, target, attempts
                    ));
                }
            }
        }
    }
}

/// Rename, falling back to copy + delete across file systems.
fn move_file(source: &Path, target: &Path) -> Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    fs::copy(source, target)
        .with_context(|| format!("failed to copy {:?} to {:?}", source, target))?;
    fs::remove_file(source).with_context(|| format!("failed to remove {:?}", source))?;
    Ok(())
}
