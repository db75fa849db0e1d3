//! The path handle returned to tests: a freshly created, uniquely named
//! directory-equivalent location on one of the supported backends.

use crate::backend::Backend;
use crate::backends::azure::ConnectionInfo;
use crate::backends::s3::S3Descriptor;
use crate::error::FixtureResult;
use bytes::Bytes;
use opendal::{Operator, services};
use std::fmt;
use std::path::{Path, PathBuf};

/// Handle to a temporary storage location.
///
/// Wraps an [`opendal::Operator`] positioned at an empty root. Relative keys
/// passed to the accessors are resolved against that root. The handle makes
/// no cleanup guarantee beyond what the backend itself provides.
#[derive(Clone, Debug)]
pub struct TempPath {
    op: Operator,
    backend: Backend,
    uri: String,
    /// Key prefix inside the operator; empty except for the shared in-memory
    /// filesystem, where it carries the isolating unique name.
    prefix: String,
    local_root: Option<PathBuf>,
    version_aware: bool,
}

impl TempPath {
    pub(crate) fn local(root: PathBuf) -> FixtureResult<Self> {
        let builder = services::Fs::default().root(&root.to_string_lossy());
        let op = Operator::new(builder)?.finish();
        Ok(Self {
            op,
            backend: Backend::Local,
            uri: root.display().to_string(),
            prefix: String::new(),
            local_root: Some(root),
            version_aware: false,
        })
    }

    /// Carve a fresh, isolated root out of the shared in-memory filesystem.
    pub(crate) async fn memory(op: Operator, name: &str) -> FixtureResult<Self> {
        let prefix = format!("{name}/");
        op.create_dir(&prefix).await?;
        Ok(Self {
            op,
            backend: Backend::Memory,
            uri: format!("memory:///{name}"),
            prefix,
            local_root: None,
            version_aware: false,
        })
    }

    pub(crate) fn s3(
        descriptor: &S3Descriptor,
        bucket: &str,
        version_aware: bool,
    ) -> FixtureResult<Self> {
        let builder = services::S3::default()
            .bucket(bucket)
            .region(descriptor.region())
            .endpoint(descriptor.endpoint_url())
            .access_key_id(descriptor.access_key_id())
            .secret_access_key(descriptor.secret_access_key())
            .disable_config_load()
            .disable_ec2_metadata();
        let op = Operator::new(builder)?.finish();
        Ok(Self {
            op,
            backend: Backend::S3,
            uri: format!("s3://{bucket}"),
            prefix: String::new(),
            local_root: None,
            version_aware,
        })
    }

    pub(crate) fn azure(connection_string: &str, container: &str) -> FixtureResult<Self> {
        let conn = ConnectionInfo::parse(connection_string)?;
        let builder = services::Azblob::default()
            .container(container)
            .endpoint(&conn.blob_endpoint)
            .account_name(&conn.account_name)
            .account_key(&conn.account_key);
        let op = Operator::new(builder)?.finish();
        Ok(Self {
            op,
            backend: Backend::Azure,
            uri: format!("az://{container}"),
            prefix: String::new(),
            local_root: None,
            version_aware: false,
        })
    }

    pub(crate) fn gcs(
        endpoint_url: Option<&str>,
        bucket: &str,
        version_aware: bool,
    ) -> FixtureResult<Self> {
        let mut builder = services::Gcs::default().bucket(bucket);
        if let Some(url) = endpoint_url {
            builder = builder
                .endpoint(url)
                .allow_anonymous()
                .disable_vm_metadata()
                .disable_config_load();
        }
        let op = Operator::new(builder)?.finish();
        Ok(Self {
            op,
            backend: Backend::Gcs,
            uri: format!("gs://{bucket}"),
            prefix: String::new(),
            local_root: None,
            version_aware,
        })
    }

    /// URI identifying this location, distinguishable by scheme.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The backend kind this path lives on.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Whether the location was created with object versioning enabled.
    pub fn version_aware(&self) -> bool {
        self.version_aware
    }

    /// Filesystem path of the root, for local paths only.
    pub fn local_path(&self) -> Option<&Path> {
        self.local_root.as_deref()
    }

    /// Underlying operator, for callers that need the full storage API.
    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn key(&self, rel: &str) -> String {
        format!("{}{rel}", self.prefix)
    }

    /// Create a directory at `rel` (parents and exist-ok semantics follow
    /// the backend).
    pub async fn create_dir(&self, rel: &str) -> FixtureResult<()> {
        let mut key = self.key(rel);
        if !key.ends_with('/') {
            key.push('/');
        }
        self.op.create_dir(&key).await?;
        Ok(())
    }

    /// Check whether `rel` exists; an empty `rel` checks the root itself.
    ///
    /// Root existence for bucket-like backends is probed with a listing,
    /// whose "empty bucket" semantics are backend-defined. A missing bucket
    /// is `Ok(false)`; transport and auth failures are errors.
    pub async fn exists(&self, rel: &str) -> FixtureResult<bool> {
        if rel.is_empty() && self.prefix.is_empty() {
            if let Some(root) = &self.local_root {
                return Ok(root.exists());
            }
            return match self.op.list("").await {
                Ok(_) => Ok(true),
                Err(err) if err.kind() == opendal::ErrorKind::NotFound => Ok(false),
                Err(err) => Err(err.into()),
            };
        }
        Ok(self.op.exists(&self.key(rel)).await?)
    }

    /// Names of the immediate children of the root.
    pub async fn entries(&self) -> FixtureResult<Vec<String>> {
        let entries = self.op.list(&self.prefix).await?;
        Ok(entries
            .into_iter()
            // the lister may report the listed directory itself
            .filter(|entry| entry.path() != self.prefix && entry.path() != "/")
            .map(|entry| entry.name().to_string())
            .collect())
    }

    /// Write `data` to the object at `rel`.
    pub async fn write(&self, rel: &str, data: impl Into<Bytes>) -> FixtureResult<()> {
        self.op.write(&self.key(rel), data.into()).await?;
        Ok(())
    }

    /// Read the object at `rel`.
    pub async fn read(&self, rel: &str) -> FixtureResult<Vec<u8>> {
        Ok(self.op.read(&self.key(rel)).await?.to_vec())
    }

    /// Read the object at `rel` as UTF-8 text.
    pub async fn read_to_string(&self, rel: &str) -> FixtureResult<String> {
        let bytes = self.read(rel).await?;
        String::from_utf8(bytes)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err).into())
    }
}

impl fmt::Display for TempPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
