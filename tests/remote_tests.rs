//! Tests against the mocked remotes. Each test skips itself (with a notice)
//! when no container runtime is available.

mod common;

use tempstore::backends::{gcs, s3};
use tempstore::{Backend, FixtureError, MktempOptions, TempPathFactory};

#[tokio::test]
async fn s3_paths_are_unique_empty_and_round_trip() {
    common::init_tracing();
    let mut factory = TempPathFactory::new().unwrap();
    let Some(first) = common::remote_path_or_skip(&mut factory, "s3").await else {
        return;
    };

    assert_eq!(first.backend(), Backend::S3);
    assert!(first.uri().starts_with("s3://"));
    assert!(first.exists("").await.unwrap());
    assert!(first.entries().await.unwrap().is_empty());

    first.write("foo", "bar").await.unwrap();
    assert_eq!(first.read_to_string("foo").await.unwrap(), "bar");

    let second = factory.mktemp("s3").await.unwrap();
    assert_ne!(first.uri(), second.uri());
    assert!(!second.exists("foo").await.unwrap());
}

#[tokio::test]
async fn s3_version_aware_enables_bucket_versioning() {
    let mut factory = TempPathFactory::new().unwrap();
    if common::remote_path_or_skip(&mut factory, "s3").await.is_none() {
        return;
    }

    let options = MktempOptions {
        version_aware: true,
        ..Default::default()
    };
    let path = factory.mktemp_with("s3", options).await.unwrap();
    assert!(path.version_aware());

    let plain = factory.mktemp("s3").await.unwrap();
    assert!(!plain.version_aware());

    let descriptor = factory.s3_descriptor().unwrap();
    let bucket = path.uri().strip_prefix("s3://").unwrap();
    assert!(
        s3::bucket_versioning_enabled(descriptor, bucket)
            .await
            .unwrap()
    );

    let plain_bucket = plain.uri().strip_prefix("s3://").unwrap();
    assert!(
        !s3::bucket_versioning_enabled(descriptor, plain_bucket)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn azure_paths_round_trip() {
    let mut factory = TempPathFactory::new().unwrap();
    let Some(path) = common::remote_path_or_skip(&mut factory, "azure").await else {
        return;
    };

    assert_eq!(path.backend(), Backend::Azure);
    assert!(path.uri().starts_with("az://"));
    assert!(path.entries().await.unwrap().is_empty());

    path.write("foo", "bar").await.unwrap();
    assert_eq!(path.read_to_string("foo").await.unwrap(), "bar");

    let second = factory.mktemp("azure").await.unwrap();
    assert_ne!(path.uri(), second.uri());
}

#[tokio::test]
async fn azure_version_aware_is_not_implemented_after_bring_up() {
    let mut factory = TempPathFactory::new().unwrap();
    if common::remote_path_or_skip(&mut factory, "azure").await.is_none() {
        return;
    }

    let err = factory
        .mktemp_with(
            "azure",
            MktempOptions {
                mock: true,
                version_aware: true,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FixtureError::NotImplemented { .. }));
}

#[tokio::test]
async fn gcs_paths_round_trip_and_gs_is_an_alias() {
    let mut factory = TempPathFactory::new().unwrap();
    let Some(path) = common::remote_path_or_skip(&mut factory, "gcs").await else {
        return;
    };

    assert_eq!(path.backend(), Backend::Gcs);
    assert!(path.uri().starts_with("gs://"));
    assert!(path.entries().await.unwrap().is_empty());

    path.write("foo", "bar").await.unwrap();
    assert_eq!(path.read_to_string("foo").await.unwrap(), "bar");

    let aliased = factory.mktemp("gs").await.unwrap();
    assert_eq!(aliased.backend(), Backend::Gcs);
    assert_ne!(path.uri(), aliased.uri());
}

#[tokio::test]
async fn gcs_version_aware_enables_bucket_versioning() {
    let mut factory = TempPathFactory::new().unwrap();
    if common::remote_path_or_skip(&mut factory, "gcs").await.is_none() {
        return;
    }

    let options = MktempOptions {
        version_aware: true,
        ..Default::default()
    };
    let path = factory.mktemp_with("gcs", options).await.unwrap();
    assert!(path.version_aware());

    let endpoint = factory.gcs_descriptor().map(|d| d.endpoint_url().to_string());
    let bucket = path.uri().strip_prefix("gs://").unwrap();
    assert!(
        gcs::bucket_versioning_enabled(endpoint.as_deref(), bucket)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn concurrent_sessions_share_one_azure_container() {
    let mut one = TempPathFactory::new().unwrap();
    if common::remote_path_or_skip(&mut one, "azure").await.is_none() {
        return;
    }

    let mut two = TempPathFactory::new().unwrap();
    two.mktemp("azure").await.unwrap();

    // the second factory attaches to the running emulator rather than
    // starting its own, so both observe the same connection string
    assert_eq!(
        one.azure_descriptor().unwrap().connection_string(),
        two.azure_descriptor().unwrap().connection_string(),
    );
}

#[tokio::test]
async fn concurrent_sessions_share_one_gcs_endpoint() {
    let mut one = TempPathFactory::new().unwrap();
    if common::remote_path_or_skip(&mut one, "gcs").await.is_none() {
        return;
    }

    let mut two = TempPathFactory::new().unwrap();
    two.mktemp("gcs").await.unwrap();

    assert_eq!(
        one.gcs_descriptor().unwrap().endpoint_url(),
        two.gcs_descriptor().unwrap().endpoint_url(),
    );
}
