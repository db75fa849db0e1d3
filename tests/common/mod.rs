use tempstore::{FixtureError, TempPath, TempPathFactory};

/// Initialize test logging (safe to call from every test).
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a path on a mocked remote, or skip when no container runtime is
/// available. Any failure other than `RemoteUnavailable` is a real failure.
#[allow(dead_code)]
pub async fn remote_path_or_skip(factory: &mut TempPathFactory, fs: &str) -> Option<TempPath> {
    match factory.mktemp(fs).await {
        Ok(path) => Some(path),
        Err(err @ FixtureError::RemoteUnavailable { .. }) => {
            eprintln!("skipping {fs} test: {err}");
            None
        }
        Err(err) => panic!("unexpected failure creating {fs} path: {err}"),
    }
}
