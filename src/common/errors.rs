use log::error;
use std::fmt;
use thiserror::Error;

/// Log the whole context chain of an error and hand it back to the caller.
pub fn handle_error(error: anyhow::Error) -> anyhow::Error {
    let mut message = format!("{}", error);
    for cause in error.chain().skip(1) {
        message.push_str(&format!("\n  caused by: {}", cause));
    }
    error!("{}", message);
    error
}

/// Errors that end a run before or between jobs.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no reachable Vantage endpoint (tried: {})", tried.join(", "))]
    NoEndpoint { tried: Vec<String> },
    #[error("job discovery failed")]
    Discovery(#[source] anyhow::Error),
    #[error("job ledger is unavailable")]
    Ledger(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedPhase {
    Register,
    Transfer,
    Finalize,
}

impl fmt::Display for FailedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailedPhase::Register => "register",
            FailedPhase::Transfer => "transfer",
            FailedPhase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A single job's intake failure. Contained at the job boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{phase} failed: {reason}")]
pub struct IntakeFailure {
    pub phase: FailedPhase,
    pub reason: String,
}

impl IntakeFailure {
    pub fn register(reason: impl Into<String>) -> Self {
        Self {
            phase: FailedPhase::Register,
            reason: reason.into(),
        }
    }

    pub fn transfer(reason: impl Into<String>) -> Self {
        Self {
            phase: FailedPhase::Transfer,
            reason: reason.into(),
        }
    }

    pub fn finalize(reason: impl Into<String>) -> Self {
        Self {
            phase: FailedPhase::Finalize,
            reason: reason.into(),
        }
    }
}
