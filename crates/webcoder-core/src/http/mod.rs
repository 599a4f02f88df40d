//! HTTP plumbing shared by the remote execution adapters.

pub mod retry;

pub use retry::{parse_retry_after, send_with_retry, RetryPolicy, MAX_ATTEMPTS};

use crate::errors::ExecutionError;
use std::time::Duration;

/// Builds the reqwest client used by a remote adapter.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ExecutionError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ExecutionError::Runtime(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn network_error(backend: &str, err: reqwest::Error) -> ExecutionError {
    ExecutionError::Network {
        backend: backend.to_string(),
        message: err.to_string(),
    }
}
