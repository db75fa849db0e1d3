//! Bring-up routines for the mocked remote backends.
//!
//! Each routine is invoked lazily, at most once per session, and returns a
//! descriptor carrying the connection information (and the container handle,
//! when the routine started one). Container-based routines serialize their
//! "check-if-running, else start" section with a cross-process file lock and
//! attach to an already-running emulator by its fixed, well-known name.

pub mod azure;
pub mod gcs;
pub mod s3;

use crate::error::{FixtureError, FixtureResult};
use std::time::Duration;
use testcontainers::{ContainerAsync, GenericImage};

/// Hard deadline for an emulator to become healthy.
pub(crate) const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between readiness probes.
pub(crate) const PROBE_PAUSE: Duration = Duration::from_millis(100);

/// Per-probe HTTP timeout.
const PROBE_HTTP_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) fn probe_client() -> FixtureResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(PROBE_HTTP_TIMEOUT)
        .build()?)
}

/// Capture a container's combined output for diagnostics.
pub(crate) async fn container_logs(container: &ContainerAsync<GenericImage>) -> String {
    let mut raw = Vec::new();
    if let Ok(bytes) = container.stdout_to_vec().await {
        raw.extend(bytes);
    }
    if let Ok(bytes) = container.stderr_to_vec().await {
        raw.extend(bytes);
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// Convert a polling deadline into a hard healthcheck failure carrying the
/// container's log output; any other error passes through unchanged.
pub(crate) async fn healthcheck_failure(
    container: &ContainerAsync<GenericImage>,
    name: &str,
    err: FixtureError,
) -> FixtureError {
    match err {
        FixtureError::TimedOut { .. } => FixtureError::HealthcheckTimeout {
            container: name.to_string(),
            logs: container_logs(container).await,
        },
        other => other,
    }
}
