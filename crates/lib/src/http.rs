//! Shared HTTP client construction.

use crate::errors::SyncError;
use std::time::Duration;

/// Per-request timeout applied to every provider call. A stalled provider
/// must not hang a sync run indefinitely.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the client adapters use for all provider traffic.
pub fn client() -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))
}
