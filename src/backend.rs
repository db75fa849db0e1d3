//! The closed set of supported storage backends.

use crate::error::FixtureError;
use std::fmt;
use std::str::FromStr;

/// A storage target kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Local filesystem, under the session's base temp directory.
    Local,
    /// Process-wide in-memory filesystem, isolated by unique prefixes.
    Memory,
    /// S3-compatible object store (mocked with MinIO).
    S3,
    /// Azure Blob Storage (mocked with Azurite).
    Azure,
    /// Google Cloud Storage (mocked with fake-gcs-server).
    Gcs,
}

impl Backend {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Memory => "memory",
            Backend::S3 => "s3",
            Backend::Azure => "azure",
            Backend::Gcs => "gcs",
        }
    }

    /// Whether this backend is served by a mocked remote (as opposed to
    /// being constructed directly).
    pub fn is_remote(&self) -> bool {
        matches!(self, Backend::S3 | Backend::Azure | Backend::Gcs)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Backend::Local),
            "memory" => Ok(Backend::Memory),
            "s3" => Ok(Backend::S3),
            "azure" => Ok(Backend::Azure),
            // `gs` is an accepted alias for `gcs`
            "gcs" | "gs" => Ok(Backend::Gcs),
            other => Err(FixtureError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_backend_names() {
        assert_eq!("local".parse::<Backend>().unwrap(), Backend::Local);
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!("s3".parse::<Backend>().unwrap(), Backend::S3);
        assert_eq!("azure".parse::<Backend>().unwrap(), Backend::Azure);
        assert_eq!("gcs".parse::<Backend>().unwrap(), Backend::Gcs);
    }

    #[test]
    fn gs_is_an_alias_for_gcs() {
        assert_eq!("gs".parse::<Backend>().unwrap(), Backend::Gcs);
    }

    #[test]
    fn unknown_name_is_an_invalid_argument() {
        let err = "bogus".parse::<Backend>().unwrap_err();
        match err {
            FixtureError::UnknownBackend(name) => assert_eq!(name, "bogus"),
            other => panic!("expected UnknownBackend, got {other}"),
        }
    }
}
