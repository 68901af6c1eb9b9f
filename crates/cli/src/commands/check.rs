//! Connectivity check command.
//!
//! # Usage
//!
//! ```bash
//! orderhub check
//! ```
//!
//! Probes each platform API with a minimal single-record request and
//! round-trips a trivial query against the warehouse. Exits nonzero if
//! anything is unreachable, so it can gate a scheduled run.

use orderhub_core::Platform;
use orderhub_ingest::client::{PageFetcher, PlatformClient};
use orderhub_ingest::config::IngestConfig;
use orderhub_ingest::sink::PgSink;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during the connectivity check.
#[derive(Debug, Error)]
pub enum CheckError {
    /// One or more probes failed.
    #[error("{failures} probe(s) failed; see log output")]
    Unreachable { failures: usize },
}

/// Probe every platform API and the warehouse.
///
/// # Errors
///
/// Returns [`CheckError::Unreachable`] if any probe fails. All probes run
/// regardless, so the log shows the full picture.
pub async fn execute(config: &IngestConfig) -> Result<(), CheckError> {
    let mut failures = 0usize;

    match PgSink::connect(&config.database_url).await {
        Ok(sink) => match sink.ping().await {
            Ok(()) => tracing::info!("warehouse: reachable"),
            Err(e) => {
                tracing::error!("warehouse: ping failed: {e}");
                failures += 1;
            }
        },
        Err(e) => {
            tracing::error!("warehouse: connection failed: {e}");
            failures += 1;
        }
    }

    for platform in Platform::ALL {
        let profile = config.profile(platform);
        match PlatformClient::new(profile.clone(), CancellationToken::new()) {
            Ok(client) => {
                if client.is_available().await {
                    tracing::info!("{platform}: reachable");
                } else {
                    tracing::error!("{platform}: probe failed");
                    failures += 1;
                }
            }
            Err(e) => {
                tracing::error!("{platform}: client setup failed: {e}");
                failures += 1;
            }
        }
    }

    if failures == 0 {
        tracing::info!("all probes passed");
        Ok(())
    } else {
        Err(CheckError::Unreachable { failures })
    }
}
