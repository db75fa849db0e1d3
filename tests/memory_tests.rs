use tempstore::{Backend, TempPathFactory};

#[tokio::test]
async fn memory_paths_are_isolated_from_each_other() {
    let mut factory = TempPathFactory::new().unwrap();

    let first = factory.mktemp("memory").await.unwrap();
    let second = factory.mktemp("memory").await.unwrap();

    first.write("foo", "foo").await.unwrap();
    second.write("bar", "bar").await.unwrap();

    assert!(first.exists("foo").await.unwrap());
    assert!(second.exists("bar").await.unwrap());
    assert!(!first.exists("bar").await.unwrap());
    assert!(!second.exists("foo").await.unwrap());
}

#[tokio::test]
async fn memory_uris_carry_the_memory_scheme() {
    let mut factory = TempPathFactory::new().unwrap();
    let path = factory.mktemp("memory").await.unwrap();

    assert_eq!(path.backend(), Backend::Memory);
    assert!(path.uri().starts_with("memory://"), "{}", path.uri());
}

#[tokio::test]
async fn memory_contents_do_not_leak_across_factories() {
    let mut one = TempPathFactory::new().unwrap();
    let mut two = TempPathFactory::new().unwrap();

    let a = one.mktemp("memory").await.unwrap();
    a.write("shared-name", "from factory one").await.unwrap();

    let b = two.mktemp("memory").await.unwrap();
    assert!(!b.exists("shared-name").await.unwrap());
}
