//! Azure Blob Storage mock backed by an Azurite container.

use crate::backends::{HEALTHCHECK_TIMEOUT, PROBE_PAUSE, healthcheck_failure, probe_client};
use crate::error::{BoxError, FixtureError, FixtureResult};
use crate::util::{SessionLock, wait_until};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::Path;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt, ReuseDirective};
use tracing::info;

const AZURITE_IMAGE: &str = "mcr.microsoft.com/azure-storage/azurite";
const AZURITE_TAG: &str = "3.32.0";
const AZURITE_PORT: u16 = 10000;
const CONTAINER_NAME: &str = "tempstore-azurite";

/// Standard development-storage account baked into Azurite.
const ACCOUNT_NAME: &str = "devstoreaccount1";
const ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const API_VERSION: &str = "2021-08-06";

/// Connection information for a provisioned Azurite (or real) blob account.
pub struct AzureDescriptor {
    connection_string: String,
    _container: Option<ContainerAsync<GenericImage>>,
}

impl AzureDescriptor {
    /// Descriptor for an account provisioned elsewhere.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            _container: None,
        }
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

/// Parsed fields of a blob-storage connection string.
#[derive(Debug)]
pub(crate) struct ConnectionInfo {
    pub(crate) account_name: String,
    pub(crate) account_key: String,
    pub(crate) blob_endpoint: String,
}

impl ConnectionInfo {
    pub(crate) fn parse(connection_string: &str) -> FixtureResult<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut blob_endpoint = None;
        let mut endpoint_suffix = None;
        let mut protocol = None;

        for part in connection_string.split(';').filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(FixtureError::InvalidConnectionString(format!(
                    "expected key=value, got {part:?}"
                )));
            };
            match key {
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "BlobEndpoint" => blob_endpoint = Some(value.to_string()),
                "EndpointSuffix" => endpoint_suffix = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = Some(value.to_string()),
                _ => {}
            }
        }

        let (Some(account_name), Some(account_key)) = (account_name, account_key) else {
            return Err(FixtureError::InvalidConnectionString(
                "AccountName and AccountKey are required".to_string(),
            ));
        };

        // real-account connection strings usually carry EndpointSuffix
        // instead of an explicit BlobEndpoint
        let blob_endpoint = match (blob_endpoint, endpoint_suffix) {
            (Some(endpoint), _) => endpoint,
            (None, Some(suffix)) => format!(
                "{}://{account_name}.blob.{suffix}",
                protocol.as_deref().unwrap_or("https")
            ),
            (None, None) => {
                return Err(FixtureError::InvalidConnectionString(
                    "either BlobEndpoint or EndpointSuffix is required".to_string(),
                ));
            }
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}

fn connection_string(port: u16) -> String {
    format!(
        "DefaultEndpointsProtocol=http;AccountName={ACCOUNT_NAME};AccountKey={ACCOUNT_KEY};\
         BlobEndpoint=http://localhost:{port}/{ACCOUNT_NAME};"
    )
}

/// Start (or attach to) the Azurite container and wait until it is healthy.
///
/// Azurite answers a bare GET on its root with HTTP 400 ("no operation
/// specified") and names itself in the `Server` header; that combination is
/// the readiness signal, not an error.
pub(crate) async fn provision(shared_dir: &Path) -> FixtureResult<AzureDescriptor> {
    let (container, port) = {
        let _lock = SessionLock::acquire(&shared_dir.join("tempstore-azurite.lock"))?;
        let container = GenericImage::new(AZURITE_IMAGE, AZURITE_TAG)
            .with_exposed_port(AZURITE_PORT.tcp())
            .with_cmd(["azurite-blob", "--loose", "--blobHost", "0.0.0.0"])
            .with_container_name(CONTAINER_NAME)
            .with_reuse(ReuseDirective::Always)
            .start()
            .await?;
        let port = container.get_host_port_ipv4(AZURITE_PORT.tcp()).await?;
        (container, port)
    };

    let url = format!("http://localhost:{port}");
    info!(endpoint = %url, "azurite container is up, waiting for readiness");

    let client = probe_client()?;
    let healthy = wait_until(
        || {
            let client = client.clone();
            let url = url.clone();
            async move {
                match client.get(&url).send().await {
                    Ok(resp) => {
                        let server = resp
                            .headers()
                            .get("server")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("");
                        Ok((resp.status() == reqwest::StatusCode::BAD_REQUEST
                            && server.contains("Azurite"))
                        .then_some(()))
                    }
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

    Ok(AzureDescriptor {
        connection_string: connection_string(port),
        _container: Some(container),
    })
}

/// Canonicalized resource for SharedKey signing: the signing account, the
/// request path as sent on the wire (Azurite carries the account in the
/// path, real endpoints do not), and the canonical query parameters.
fn canonicalized_resource(account: &str, url: &reqwest::Url) -> String {
    format!("/{account}{}\nrestype:container", url.path())
}

/// Create a blob container with a single SharedKey-signed PUT.
pub(crate) async fn create_container(
    connection_string: &str,
    container: &str,
) -> FixtureResult<()> {
    let conn = ConnectionInfo::parse(connection_string)?;
    let key = BASE64.decode(&conn.account_key).map_err(|err| {
        FixtureError::InvalidConnectionString(format!("account key is not base64: {err}"))
    })?;

    let url = format!("{}/{container}", conn.blob_endpoint.trim_end_matches('/'));
    let url = reqwest::Url::parse(&url).map_err(|err| {
        FixtureError::InvalidConnectionString(format!("invalid blob endpoint: {err}"))
    })?;

    let date = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    let account = &conn.account_name;
    // SharedKey canonicalization: verb, eleven empty standard headers
    // (Content-Length is empty when zero), x-ms headers, then the resource.
    let string_to_sign = format!(
        "PUT\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:{date}\nx-ms-version:{API_VERSION}\n{}",
        canonicalized_resource(account, &url)
    );
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|err| FixtureError::InvalidConnectionString(err.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    reqwest::Client::new()
        .put(format!("{url}?restype=container"))
        .header("x-ms-date", &date)
        .header("x-ms-version", API_VERSION)
        .header(
            "authorization",
            format!("SharedKey {account}:{signature}"),
        )
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
