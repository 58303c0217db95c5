pub mod adstream;
pub mod auth;
pub mod vantage;

use anyhow::Result;
use reqwest::blocking::Client;
use std::time::Duration;

use crate::common::CONNECT_TIMEOUT_SECS;

/// Shared blocking client. `timeout` bounds a whole request, uploads included.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .user_agent(concat!("adstream-uploader/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
