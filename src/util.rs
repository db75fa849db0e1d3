//! Polling, naming, and locking primitives shared by every bring-up routine.

use crate::error::{BoxError, FixtureError, FixtureResult};
use rand::Rng;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Repeatedly invoke `probe` every `pause` until it yields a value or
/// `timeout` elapses.
///
/// Probe errors are retryable; only the deadline is fatal. On timeout the
/// last probe error, if any, is chained into [`FixtureError::TimedOut`].
pub async fn wait_until<T, F, Fut>(
    mut probe: F,
    timeout: Duration,
    pause: Duration,
) -> FixtureResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, BoxError>>,
{
    let deadline = Instant::now() + timeout;
    let mut last_err: Option<BoxError> = None;

    while Instant::now() < deadline {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => {
                debug!(error = %err, "probe failed, retrying");
                last_err = Some(err);
            }
        }
        tokio::time::sleep(pause).await;
    }

    Err(FixtureError::TimedOut {
        waited: timeout,
        source: last_err,
    })
}

/// Short random identifier drawn from lowercase ASCII letters.
///
/// Not cryptographically secure; the purpose is collision avoidance for
/// bucket, container, and directory names.
pub fn random_string(n: usize) -> String {
    let mut rng = rand::rng();
    (0..n).map(|_| rng.random_range('a'..='z')).collect()
}

/// Unique name for a provisioned location (bucket, container, directory).
pub(crate) fn temp_name() -> String {
    format!("tempstore-{}", random_string(6))
}

/// Number of attempts before port allocation is treated as a hard failure.
const FREE_PORT_RETRIES: u32 = 3;

/// Ask the OS for a free TCP port on the loopback interface.
///
/// The port may be claimed by another process between the probe and its
/// eventual use; callers tolerate that by retrying their own bind.
pub fn free_port() -> FixtureResult<u16> {
    let mut attempts = FREE_PORT_RETRIES;
    loop {
        match TcpListener::bind(("127.0.0.1", 0)).and_then(|l| l.local_addr()) {
            Ok(addr) => return Ok(addr.port()),
            Err(err) => {
                attempts -= 1;
                if attempts == 0 {
                    return Err(FixtureError::Port(err));
                }
            }
        }
    }
}

/// Cross-process advisory lock guarding a "check-if-running, else start"
/// critical section. Unlocked when dropped.
pub struct SessionLock {
    file: File,
}

impl SessionLock {
    /// Block until the lock file at `path` is held by this process.
    pub fn acquire(path: &Path) -> FixtureResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock()?;
        debug!(path = %path.display(), "acquired session lock");
        Ok(Self { file })
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn wait_until_returns_immediately_on_success() {
        let started = Instant::now();
        let value = wait_until(
            || async { Ok::<_, BoxError>(Some(42)) },
            Duration::from_secs(5),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn wait_until_retries_until_predicate_becomes_true() {
        let calls = AtomicU32::new(0);
        let value = wait_until(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, BoxError>((n >= 3).then_some("ready")) }
            },
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(value, "ready");
        assert!(calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn wait_until_times_out_when_predicate_never_true() {
        let err = wait_until(
            || async { Ok::<Option<()>, BoxError>(None) },
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

        match err {
            FixtureError::TimedOut { source, .. } => assert!(source.is_none()),
            other => panic!("expected TimedOut, got {other}"),
        }
    }

    #[tokio::test]
    async fn wait_until_chains_last_probe_error_on_timeout() {
        let err = wait_until(
            || async {
                Err::<Option<()>, BoxError>("probe exploded".to_string().into())
            },
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

        match err {
            FixtureError::TimedOut { source, .. } => {
                let source = source.expect("expected chained probe error");
                assert!(source.to_string().contains("probe exploded"));
            }
            other => panic!("expected TimedOut, got {other}"),
        }
    }

    #[test]
    fn random_string_uses_lowercase_alphabet() {
        let s = random_string(6);
        assert_eq!(s.len(), 6);
        assert!(s.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn random_string_does_not_repeat() {
        let names: std::collections::HashSet<String> =
            (0..100).map(|_| random_string(6)).collect();
        assert!(names.len() > 90, "too many collisions: {}", names.len());
    }

    #[test]
    fn free_port_returns_bindable_port() {
        let port = free_port().unwrap();
        assert_ne!(port, 0);
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn session_lock_is_reentrant_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.lock");
        {
            let _guard = SessionLock::acquire(&path).unwrap();
        }
        // released on drop, so a second acquisition must not block
        let _guard = SessionLock::acquire(&path).unwrap();
    }
}
