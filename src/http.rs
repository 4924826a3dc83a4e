//! Shared HTTP client construction.

use crate::error::ConfigurationError;
use std::time::Duration;

/// Timeout for cheap probe calls such as model listings.
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Create an HTTP client with the given request timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<reqwest::Client, ConfigurationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigurationError::Invalid(format!("Failed to create HTTP client: {e}")))
}
