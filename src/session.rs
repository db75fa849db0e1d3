//! Session-scoped state: base temp directory, environment patching, and the
//! shared directory where cross-process lock files live.

use crate::error::FixtureResult;
use crate::util::random_string;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Environment-variable patcher whose changes are rolled back when the
/// session ends.
///
/// Environment mutation is process-global; sessions drive it from a single
/// thread during bring-up, before any test body runs.
#[derive(Debug, Default)]
pub struct EnvGuard {
    saved: HashMap<String, Option<OsString>>,
}

impl EnvGuard {
    /// Set `key` to `value`, remembering the original value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.save(key);
        unsafe { std::env::set_var(key, value) };
    }

    /// Remove `key`, remembering the original value.
    pub fn remove(&mut self, key: &str) {
        self.save(key);
        unsafe { std::env::remove_var(key) };
    }

    fn save(&mut self, key: &str) {
        self.saved
            .entry(key.to_string())
            .or_insert_with(|| std::env::var_os(key));
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain() {
            match original {
                Some(value) => unsafe { std::env::set_var(&key, value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

/// State owned for the lifetime of one test session.
///
/// Holds the base temporary-directory allocator, the environment patcher,
/// and the directory shared with other test processes for lock and state
/// files. There are no process-wide singletons; everything session-scoped
/// lives here and is dropped at session end.
#[derive(Debug)]
pub struct SessionContext {
    base: TempDir,
    env: EnvGuard,
    shared_dir: PathBuf,
}

impl SessionContext {
    /// Create a fresh session rooted in a new temporary directory.
    pub fn new() -> FixtureResult<Self> {
        let base = tempfile::Builder::new()
            .prefix("tempstore-session-")
            .tempdir()?;
        debug!(base = %base.path().display(), "created session base directory");
        Ok(Self {
            base,
            env: EnvGuard::default(),
            // Lock files must be visible to parallel test processes, so they
            // live in the OS temp directory rather than the session base.
            shared_dir: std::env::temp_dir(),
        })
    }

    /// Base temporary directory for this session.
    pub fn base_path(&self) -> &Path {
        self.base.path()
    }

    /// Allocate a new, uniquely named directory under the session base.
    pub fn mktemp(&self, prefix: &str) -> FixtureResult<PathBuf> {
        loop {
            let dir = self
                .base
                .path()
                .join(format!("{prefix}-{}", random_string(6)));
            match std::fs::create_dir(&dir) {
                Ok(()) => return Ok(dir),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Session-scoped environment patcher.
    pub fn env_mut(&mut self) -> &mut EnvGuard {
        &mut self.env
    }

    /// Directory holding cross-process lock and state files.
    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }
}
