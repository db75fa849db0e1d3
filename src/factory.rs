//! The temporary-path factory and the registry of mocked remotes.

use crate::backend::Backend;
use crate::backends::azure::{self, AzureDescriptor};
use crate::backends::gcs::{self, GcsDescriptor};
use crate::backends::s3::{self, S3Descriptor};
use crate::error::{FixtureError, FixtureResult};
use crate::path::TempPath;
use crate::session::SessionContext;
use crate::util::{random_string, temp_name};
use opendal::{Operator, services};
use std::path::PathBuf;
use tracing::debug;

/// Options accepted by [`TempPathFactory::mktemp_with`].
#[derive(Clone, Copy, Debug)]
pub struct MktempOptions {
    /// Use a mocked emulator (the default) rather than a real account.
    pub mock: bool,
    /// Enable object versioning where the backend supports it.
    pub version_aware: bool,
}

impl Default for MktempOptions {
    fn default() -> Self {
        Self {
            mock: true,
            version_aware: false,
        }
    }
}

/// Pre-supplied descriptors, letting callers bypass bring-up entirely (for
/// example when pointing at a real cloud account).
#[derive(Default)]
pub struct FactoryOverrides {
    pub s3: Option<S3Descriptor>,
    pub azure_connection_string: Option<String>,
    pub gcs_endpoint_url: Option<String>,
    /// Chain the full bring-up failure cause into `RemoteUnavailable`
    /// instead of suppressing it.
    pub verbose_errors: bool,
}

/// Which descriptor slot a bring-up routine fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    S3,
    Azure,
    Gcs,
}

/// Static description of one mocked remote.
struct RemoteSpec {
    backend: Backend,
    slot: Slot,
    requires_container_runtime: bool,
}

/// Registry of mocked remotes. Supporting a new backend means one entry
/// here plus one bring-up routine; nothing else changes.
const REMOTES: &[RemoteSpec] = &[
    RemoteSpec {
        backend: Backend::S3,
        slot: Slot::S3,
        requires_container_runtime: true,
    },
    RemoteSpec {
        backend: Backend::Azure,
        slot: Slot::Azure,
        requires_container_runtime: true,
    },
    RemoteSpec {
        backend: Backend::Gcs,
        slot: Slot::Gcs,
        requires_container_runtime: true,
    },
];

/// Container bring-up is skipped where the runtime is known to be flaky.
fn container_runtime_unreliable() -> bool {
    cfg!(windows) && std::env::var_os("CI").is_some()
}

/// Session-scoped factory for temporary storage locations.
///
/// Descriptor slots start empty and are filled lazily, at most once per
/// session; a failed bring-up is not cached, so a later call retries from
/// scratch. The factory is driven from a single thread, matching the test
/// runner's sequential-per-session execution.
pub struct TempPathFactory {
    session: Option<SessionContext>,
    s3: Option<S3Descriptor>,
    azure: Option<AzureDescriptor>,
    gcs: Option<GcsDescriptor>,
    /// Process-wide in-memory filesystem shared by all memory paths of this
    /// session; isolation comes from unique per-path prefixes.
    memory_fs: Option<Operator>,
    verbose_errors: bool,
}

impl Default for TempPathFactory {
    /// Factory without session state; local paths fall back to the
    /// process-global temp directory.
    fn default() -> Self {
        Self {
            session: None,
            s3: None,
            azure: None,
            gcs: None,
            memory_fs: None,
            verbose_errors: false,
        }
    }
}

impl TempPathFactory {
    /// Factory with a fresh session and no pre-supplied descriptors.
    pub fn new() -> FixtureResult<Self> {
        Ok(Self::from_session(
            SessionContext::new()?,
            FactoryOverrides::default(),
        ))
    }

    /// Factory bound to session state, with optional pre-supplied
    /// descriptors taking precedence over bring-up.
    pub fn from_session(session: SessionContext, overrides: FactoryOverrides) -> Self {
        Self {
            session: Some(session),
            s3: overrides.s3,
            azure: overrides.azure_connection_string.map(AzureDescriptor::new),
            gcs: overrides.gcs_endpoint_url.map(GcsDescriptor::new),
            memory_fs: None,
            verbose_errors: overrides.verbose_errors,
        }
    }

    /// The session this factory is bound to, if any.
    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// The cached S3 descriptor, once provisioned or supplied.
    pub fn s3_descriptor(&self) -> Option<&S3Descriptor> {
        self.s3.as_ref()
    }

    /// The cached Azure descriptor, once provisioned or supplied.
    pub fn azure_descriptor(&self) -> Option<&AzureDescriptor> {
        self.azure.as_ref()
    }

    /// The cached GCS descriptor, once provisioned or supplied.
    pub fn gcs_descriptor(&self) -> Option<&GcsDescriptor> {
        self.gcs.as_ref()
    }

    /// Create a new temporary location on `fs` with default options
    /// (mocked, not version-aware).
    ///
    /// Accepted backend names: `local`, `memory`, `s3`, `azure`, `gcs`
    /// (alias `gs`).
    pub async fn mktemp(&mut self, fs: &str) -> FixtureResult<TempPath> {
        self.mktemp_with(fs, MktempOptions::default()).await
    }

    /// Create a new temporary location on `fs`.
    pub async fn mktemp_with(
        &mut self,
        fs: &str,
        options: MktempOptions,
    ) -> FixtureResult<TempPath> {
        let backend: Backend = fs.parse()?;

        if !backend.is_remote() {
            if options.version_aware {
                return Err(FixtureError::NotImplemented {
                    backend: backend.as_str(),
                    feature: "version-aware paths",
                });
            }
            return match backend {
                Backend::Local => self.local(),
                Backend::Memory => self.memory().await,
                _ => unreachable!("non-remote backends are local and memory"),
            };
        }

        if options.mock {
            self.mock_remote_setup(backend).await?;
        }

        match backend {
            Backend::S3 => {
                let descriptor = self
                    .s3
                    .as_ref()
                    .ok_or_else(|| missing_remote(backend, "missing descriptor"))?;
                self.s3(descriptor, options.version_aware).await
            }
            Backend::Azure => {
                if options.version_aware && options.mock {
                    return Err(FixtureError::NotImplemented {
                        backend: backend.as_str(),
                        feature: "version-aware paths",
                    });
                }
                let connection_string = self
                    .azure
                    .as_ref()
                    .map(AzureDescriptor::connection_string)
                    .ok_or_else(|| missing_remote(backend, "missing connection string"))?;
                self.azure(connection_string).await
            }
            Backend::Gcs => {
                let endpoint = self.gcs.as_ref().map(GcsDescriptor::endpoint_url);
                self.gcs(endpoint, options.version_aware).await
            }
            _ => unreachable!("remote backends are s3, azure and gcs"),
        }
    }

    /// Create a local temporary directory.
    pub fn local(&self) -> FixtureResult<TempPath> {
        let dir = match &self.session {
            Some(session) => session.mktemp("tempstore")?,
            None => {
                let dir = std::env::temp_dir().join(temp_name());
                std::fs::create_dir_all(&dir)?;
                dir
            }
        };
        TempPath::local(dir)
    }

    /// Create a fresh path on the session's shared in-memory filesystem.
    pub async fn memory(&mut self) -> FixtureResult<TempPath> {
        let op = match &self.memory_fs {
            Some(op) => op.clone(),
            None => {
                let op = Operator::new(services::Memory::default())?.finish();
                self.memory_fs = Some(op.clone());
                op
            }
        };
        TempPath::memory(op, &random_string(6)).await
    }

    /// Create a new S3 bucket and return a path at its root.
    pub async fn s3(
        &self,
        descriptor: &S3Descriptor,
        version_aware: bool,
    ) -> FixtureResult<TempPath> {
        let bucket = temp_name();
        s3::create_bucket(descriptor, &bucket, version_aware).await?;
        TempPath::s3(descriptor, &bucket, version_aware)
    }

    /// Create a new blob container and return a path at its root.
    pub async fn azure(&self, connection_string: &str) -> FixtureResult<TempPath> {
        let container = temp_name();
        azure::create_container(connection_string, &container).await?;
        TempPath::azure(connection_string, &container)
    }

    /// Create a new GCS bucket and return a path at its root. Passing no
    /// endpoint targets the real service.
    pub async fn gcs(
        &self,
        endpoint_url: Option<&str>,
        version_aware: bool,
    ) -> FixtureResult<TempPath> {
        let bucket = temp_name();
        gcs::create_bucket(endpoint_url, &bucket, version_aware).await?;
        TempPath::gcs(endpoint_url, &bucket, version_aware)
    }

    /// Ensure the mocked remote for `backend` is provisioned, invoking its
    /// bring-up routine if the descriptor slot is still empty.
    async fn mock_remote_setup(&mut self, backend: Backend) -> FixtureResult<()> {
        let spec = REMOTES
            .iter()
            .find(|spec| spec.backend == backend)
            .ok_or_else(|| missing_remote(backend, "no mock remote available"))?;

        let configured = match spec.slot {
            Slot::S3 => self.s3.is_some(),
            Slot::Azure => self.azure.is_some(),
            Slot::Gcs => self.gcs.is_some(),
        };
        if configured {
            return Ok(());
        }

        if spec.requires_container_runtime && container_runtime_unreliable() {
            return Err(missing_remote(
                backend,
                "container runtime is unreliable on Windows CI runners",
            ));
        }

        debug!(backend = %backend, "provisioning mock remote");
        let shared_dir: PathBuf = self
            .session
            .as_ref()
            .map(|s| s.shared_dir().to_path_buf())
            .unwrap_or_else(std::env::temp_dir);

        let provisioned = match spec.slot {
            Slot::S3 => {
                let env = self.session.as_mut().map(SessionContext::env_mut);
                s3::provision(&shared_dir, env).await.map(|descriptor| {
                    self.s3 = Some(descriptor);
                })
            }
            Slot::Azure => azure::provision(&shared_dir).await.map(|descriptor| {
                self.azure = Some(descriptor);
            }),
            Slot::Gcs => gcs::provision(&shared_dir).await.map(|descriptor| {
                self.gcs = Some(descriptor);
            }),
        };

        provisioned.map_err(|err| self.wrap_bring_up_failure(backend, err))
    }

    /// Re-wrap a bring-up failure so callers handle one error type for any
    /// backend. Healthcheck timeouts stay hard and keep their log payload.
    fn wrap_bring_up_failure(&self, backend: Backend, err: FixtureError) -> FixtureError {
        if matches!(err, FixtureError::HealthcheckTimeout { .. }) {
            return err;
        }
        if self.verbose_errors {
            FixtureError::RemoteUnavailable {
                backend: backend.to_string(),
                reason: err.to_string(),
                source: Some(Box::new(err)),
            }
        } else {
            FixtureError::RemoteUnavailable {
                backend: backend.to_string(),
                reason: format!(
                    "{err}; enable FactoryOverrides::verbose_errors for the full cause"
                ),
                source: None,
            }
        }
    }
}

fn missing_remote(backend: Backend, reason: &str) -> FixtureError {
    FixtureError::RemoteUnavailable {
        backend: backend.to_string(),
        reason: reason.to_string(),
        source: None,
    }
}
