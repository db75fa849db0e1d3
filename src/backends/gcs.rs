//! GCS mock backed by a fake-gcs-server container.

use crate::backends::{HEALTHCHECK_TIMEOUT, PROBE_PAUSE, healthcheck_failure, probe_client};
use crate::error::{BoxError, FixtureResult};
use crate::util::{SessionLock, free_port, wait_until};
use std::path::Path;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt, ReuseDirective};
use tracing::{info, warn};

const GCS_IMAGE: &str = "fsouza/fake-gcs-server";
const GCS_TAG: &str = "1.49.3";
const GCS_PORT: u16 = 4443;
const CONTAINER_NAME: &str = "tempstore-fake-gcs";

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

fn public_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

/// Host port recorded by a previous bring-up, if the state file holds one.
fn stored_port(state: &Path) -> Option<u16> {
    std::fs::read_to_string(state).ok()?.trim().parse().ok()
}

async fn start_container(
    port: u16,
) -> Result<ContainerAsync<GenericImage>, testcontainers::TestcontainersError> {
    let url = public_url(port);
    GenericImage::new(GCS_IMAGE, GCS_TAG)
        .with_exposed_port(GCS_PORT.tcp())
        .with_cmd([
            "-backend",
            "memory",
            "-scheme",
            "http",
            "-public-host",
            url.as_str(),
            "-external-url",
            url.as_str(),
        ])
        .with_container_name(CONTAINER_NAME)
        .with_reuse(ReuseDirective::Always)
        .with_mapped_port(port, GCS_PORT.tcp())
        .start()
        .await
}

/// Connection information for a provisioned GCS emulator.
pub struct GcsDescriptor {
    endpoint_url: String,
    _container: Option<ContainerAsync<GenericImage>>,
}

impl GcsDescriptor {
    /// Descriptor for an emulator provisioned elsewhere.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            _container: None,
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

/// Start (or attach to) the fake-gcs-server container and wait until its
/// bucket-listing endpoint answers.
///
/// Signed URLs and resumable uploads require the emulator to know the URL it
/// is reached at, so the host port is chosen up front and persisted next to
/// the lock file; a concurrent session reads it back, builds the identical
/// container request, and attaches instead of starting a second emulator.
pub(crate) async fn provision(shared_dir: &Path) -> FixtureResult<GcsDescriptor> {
    let (container, url) = {
        let _lock = SessionLock::acquire(&shared_dir.join("tempstore-fake-gcs.lock"))?;

        let state = shared_dir.join("tempstore-fake-gcs.port");
        let recorded = stored_port(&state);
        let port = match recorded {
            Some(port) => port,
            None => {
                let port = free_port()?;
                std::fs::write(&state, port.to_string())?;
                port
            }
        };

        match start_container(port).await {
            Ok(container) => (container, public_url(port)),
            // a recorded port goes stale when the emulator is gone and the
            // port has since been claimed by another process
            Err(err) if recorded.is_some() => {
                warn!(error = %err, port, "recorded port is stale, retrying with a fresh one");
                let port = free_port()?;
                std::fs::write(&state, port.to_string())?;
                (start_container(port).await?, public_url(port))
            }
            Err(err) => return Err(err.into()),
        }
    };

    info!(endpoint = %url, "fake-gcs-server container is up, waiting for readiness");

    let client = probe_client()?;
    let healthy = wait_until(
        || {
            let client = client.clone();
            let url = format!("{url}/storage/v1/b");
            async move {
                match client.get(&url).send().await {
                    Ok(resp) => Ok(resp.status().is_success().then_some(())),
                    Err(err) => Err(Box::new(err) as BoxError),
                }
            }
        },
        HEALTHCHECK_TIMEOUT,
        PROBE_PAUSE,
    )
    .await;
    if let Err(err) = healthy {
        return Err(healthcheck_failure(&container, CONTAINER_NAME, err).await);
    }

    Ok(GcsDescriptor {
        endpoint_url: url,
        _container: Some(container),
    })
}

/// Create a bucket through the JSON API, enabling object versioning when
/// requested.
pub(crate) async fn create_bucket(
    endpoint_url: Option<&str>,
    bucket: &str,
    versioning: bool,
) -> FixtureResult<()> {
    let base = endpoint_url.unwrap_or(DEFAULT_ENDPOINT);
    let body = serde_json::json!({
        "name": bucket,
        "versioning": { "enabled": versioning },
    });
    reqwest::Client::new()
        .post(format!("{base}/storage/v1/b"))
        .json(&body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

/// Whether the bucket reports object versioning as enabled.
pub async fn bucket_versioning_enabled(
    endpoint_url: Option<&str>,
    bucket: &str,
) -> FixtureResult<bool> {
    let base = endpoint_url.unwrap_or(DEFAULT_ENDPOINT);
    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{base}/storage/v1/b/{bucket}"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(body
        .pointer("/versioning/enabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_port_ignores_missing_or_garbled_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("port");

        assert_eq!(stored_port(&state), None);

        std::fs::write(&state, "not-a-port").unwrap();
        assert_eq!(stored_port(&state), None);

        std::fs::write(&state, "4443\n").unwrap();
        assert_eq!(stored_port(&state), Some(4443));
    }
}
