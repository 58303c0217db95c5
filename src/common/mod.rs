pub mod errors;

/// Vantage job state code for a job that finished successfully.
pub const JOB_STATE_COMPLETE: i64 = 5;

pub const VANTAGE_PORT: u16 = 8676;

pub const DEFAULT_PACING_SECS: u64 = 10;

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 3600;

pub const CONNECT_TIMEOUT_SECS: u64 = 30;

pub const MAX_ARCHIVE_ATTEMPTS: u64 = 5;

pub const DEFAULT_STAGING_FOLDER: &str = "_Staging";

pub const DEFAULT_INFO_JOB_NAME: &str = "_Info for AdStream Uploads";

pub const DEFAULT_MEDIA_SUBTYPE: &str = "element";

/// Job output variables carrying the rendered file.
pub const VAR_FILE_PATH: &str = "File Path";
pub const VAR_FILE_NAME: &str = "File Name";

/// Per-item status Adstream reports for an accepted placeholder.
pub const REGISTER_STATUS_OK: &str = "succeeded";

pub const LOG_FILE_PREFIX: &str = "adstream_upload";
