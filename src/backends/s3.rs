//! S3 mock backed by a MinIO container.

use crate::backends::{HEALTHCHECK_TIMEOUT, PROBE_PAUSE, healthcheck_failure, probe_client};
use crate::error::{BoxError, FixtureError, FixtureResult};
use crate::session::EnvGuard;
use crate::util::{SessionLock, wait_until};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::types::{BucketVersioningStatus, VersioningConfiguration};
use std::path::Path;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt, ReuseDirective};
use tracing::info;

const MINIO_IMAGE: &str = "minio/minio";
const MINIO_TAG: &str = "RELEASE.2024-02-12T21-36-45Z";
const MINIO_PORT: u16 = 9000;
const CONTAINER_NAME: &str = "tempstore-minio";
const ACCESS_KEY: &str = "tempstore";
// MinIO requires root credentials of at least 8 characters.
const SECRET_KEY: &str = "tempstore";
const REGION: &str = "us-east-1";

/// Connection information for an S3-compatible endpoint.
///
/// Immutable once created; holds the backing container alive for the
/// lifetime of the factory that owns it.
pub struct S3Descriptor {
    endpoint_url: String,
    access_key_id: String,
    secret_access_key: String,
    region: String,
    _container: Option<ContainerAsync<GenericImage>>,
}

impl S3Descriptor {
    /// Descriptor for an endpoint provisioned elsewhere (including a real
    /// account).
    pub fn new(
        endpoint_url: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            _container: None,
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Start (or attach to) the MinIO container and wait until it responds.
///
/// Readiness is "the server accepts connections and responds", not HTTP
/// success. Fake AWS credentials are exported through the session env
/// patcher so SDK default chains inside the test process resolve to the
/// mock.
pub(crate) async fn provision(
    shared_dir: &Path,
    env: Option<&mut EnvGuard>,
) -> FixtureResult<S3Descriptor> {
    let (container, port) = {
        let _lock = SessionLock::acquire(&shared_dir.join("tempstore-minio.lock"))?;
        let container = GenericImage::new(MINIO_IMAGE, MINIO_TAG)
            .with_exposed_port(MINIO_PORT.tcp())
            .with_env_var("MINIO_ROOT_USER", ACCESS_KEY)
            .with_env_var("MINIO_ROOT_PASSWORD", SECRET_KEY)
            .with_cmd(["server", "/data"])
            .with_container_name(CONTAINER_NAME)
            .with_reuse(ReuseDirective::Always)
            .start()
            .await?;
        let port = container.get_host_port_ipv4(MINIO_PORT.tcp()).await?;
        (container, port)
    };

    let endpoint_url = format!("http://localhost:{port}");
    info!(endpoint = %endpoint_url, "minio container is up, waiting for readiness");

    let client = probe_client()?;
    let healthy = wait_until(
        || {
            let client = client.clone();
            let url = endpoint_url.clone();
            async move {
                match client.get(&url).send().await {
                    Ok(_) => Ok(Some(())),
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

    if let Some(env) = env {
        env.remove("AWS_PROFILE");
        env.set("AWS_ACCESS_KEY_ID", ACCESS_KEY);
        env.set("AWS_SECRET_ACCESS_KEY", SECRET_KEY);
        env.set("AWS_SECURITY_TOKEN", ACCESS_KEY);
        env.set("AWS_SESSION_TOKEN", ACCESS_KEY);
        env.set("AWS_DEFAULT_REGION", REGION);
    }

    Ok(S3Descriptor {
        endpoint_url,
        access_key_id: ACCESS_KEY.to_string(),
        secret_access_key: SECRET_KEY.to_string(),
        region: REGION.to_string(),
        _container: Some(container),
    })
}

/// S3 control-plane client for the descriptor's endpoint.
fn client(descriptor: &S3Descriptor) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        descriptor.access_key_id.clone(),
        descriptor.secret_access_key.clone(),
        None,
        None,
        "tempstore",
    );
    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(descriptor.region.clone()))
        .credentials_provider(credentials)
        .http_client(aws_smithy_http_client::Builder::new().build_http())
        .endpoint_url(descriptor.endpoint_url.clone())
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(config)
}

/// Create a bucket, enabling object versioning when requested.
pub(crate) async fn create_bucket(
    descriptor: &S3Descriptor,
    bucket: &str,
    versioning: bool,
) -> FixtureResult<()> {
    let client = client(descriptor);
    client
        .create_bucket()
        .bucket(bucket)
        .send()
        .await
        .map_err(|err| FixtureError::S3(Box::new(err)))?;

    if versioning {
        client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| FixtureError::S3(Box::new(err)))?;
    }
    Ok(())
}

/// Whether the bucket reports object versioning as enabled.
pub async fn bucket_versioning_enabled(
    descriptor: &S3Descriptor,
    bucket: &str,
) -> FixtureResult<bool> {
    let output = client(descriptor)
        .get_bucket_versioning()
        .bucket(bucket)
        .send()
        .await
        .map_err(|err| FixtureError::S3(Box::new(err)))?;
    Ok(matches!(output.status(), Some(BucketVersioningStatus::Enabled)))
}
