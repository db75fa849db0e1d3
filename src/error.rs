//! Fixture error types.

use std::time::Duration;
use thiserror::Error;

/// Boxed error used to carry SDK and probe failures without committing the
/// public API to their concrete types.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while provisioning or addressing temporary storage.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The requested backend's mock could not be established. This is the
    /// single error type callers handle for any bring-up failure; the
    /// lower-level cause is attached when verbose diagnostics are enabled.
    #[error("{backend}: failed to set up mock remote: {reason}")]
    RemoteUnavailable {
        backend: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A started emulator never became healthy within its deadline.
    /// Carries the container's captured log output for diagnosis.
    #[error("healthcheck timed out for container {container}:\n{logs}")]
    HealthcheckTimeout { container: String, logs: String },

    /// `wait_until` exhausted its deadline; the last probe error, if any,
    /// is chained as the source.
    #[error("timed out waiting after {waited:?}")]
    TimedOut {
        waited: Duration,
        #[source]
        source: Option<BoxError>,
    },

    /// The requested feature combination is not supported for this backend.
    #[error("{feature} not implemented for backend {backend}")]
    NotImplemented {
        backend: &'static str,
        feature: &'static str,
    },

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("could not allocate a free port")]
    Port(#[source] std::io::Error),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("S3 error: {0}")]
    S3(BoxError),

    #[error("container runtime error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("storage error: {0}")]
    Storage(#[from] opendal::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fixture operations.
pub type FixtureResult<T> = std::result::Result<T, FixtureError>;
