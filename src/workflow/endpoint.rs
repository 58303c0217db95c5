use log::{error, info};

use crate::common::errors::RunError;

/// Answers whether a Vantage host is up. Unreachable counts as unhealthy.
pub trait HealthProbe {
    fn is_healthy(&self, endpoint: &str) -> bool;
}

/// First healthy endpoint in priority order. Later candidates are not probed.
pub fn select_endpoint<P: HealthProbe + ?Sized>(
    candidates: &[String],
    probe: &P,
) -> Result<String, RunError> {
    for endpoint in candidates.iter().filter(|e| !e.trim().is_empty()) {
        if probe.is_healthy(endpoint) {
            info!("{} online status is confirmed", endpoint.to_uppercase());
            return Ok(endpoint.clone());
        }
        error!(
            "{} is not active or unreachable, please check the Vantage SDK service on the host",
            endpoint.to_uppercase()
        );
    }
    Err(RunError::NoEndpoint {
        tried: candidates.to_vec(),
    })
}
