//! Ephemeral, isolated storage locations for test suites.
//!
//! This crate provides:
//! - A session-scoped [`TempPathFactory`] handing each test a fresh,
//!   uniquely named [`TempPath`] on a chosen backend
//! - Backends: local filesystem, in-memory, and mocked S3 (MinIO), Azure
//!   Blob Storage (Azurite), and GCS (fake-gcs-server)
//! - Lazy, once-per-session emulator bring-up with cross-process locking
//!   and bounded health-checking
//!
//! ```no_run
//! # async fn example() -> tempstore::FixtureResult<()> {
//! let mut factory = tempstore::TempPathFactory::new()?;
//! let path = factory.mktemp("s3").await?;
//! path.write("greeting", "hello").await?;
//! assert_eq!(path.read_to_string("greeting").await?, "hello");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod error;
pub mod factory;
pub mod path;
pub mod session;
pub mod util;

pub use backend::Backend;
pub use backends::azure::AzureDescriptor;
pub use backends::gcs::GcsDescriptor;
pub use backends::s3::S3Descriptor;
pub use error::{BoxError, FixtureError, FixtureResult};
pub use factory::{FactoryOverrides, MktempOptions, TempPathFactory};
pub use path::TempPath;
pub use session::{EnvGuard, SessionContext};
pub use util::{SessionLock, free_port, random_string, wait_until};
