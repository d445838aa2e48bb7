mod common;

use common::open_book;
use logbook::{Channel, Error, LogBook, LogBookOptions, Registry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn test_open_creates_channel_directories() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("nested").join("logs");
    let registry = Registry::new();
    let _book = open_book(&registry, &root);

    for channel in Channel::ALL {
        assert!(root.join(channel.as_str()).is_dir(), "missing {channel}/");
    }
    // Active files are created lazily on first write.
    assert!(!root.join("log").join("log.log").exists());
}

#[tokio::test]
async fn test_same_directory_returns_same_instance() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let a = open_book(&registry, dir.path());
    let b = open_book(&registry, dir.path());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_unnormalized_path_is_deduplicated() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("logs");
    let registry = Registry::new();
    let a = open_book(&registry, &root);
    let b = open_book(&registry, &root.join("..").join("logs"));

    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn test_second_open_keeps_first_options() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let a = LogBook::builder(dir.path())
        .rotation(Duration::from_secs(3600))
        .open(&registry)
        .unwrap();
    let b = LogBook::builder(dir.path()).open(&registry).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(b.rotation(), Some(Duration::from_secs(3600)));
}

#[tokio::test]
async fn test_different_directories_are_distinct() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let a = open_book(&registry, &dir.path().join("a"));
    let b = open_book(&registry, &dir.path().join("b"));

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_close_unregisters_and_reopen_is_fresh() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let a = open_book(&registry, dir.path());
    a.close();

    assert!(registry.is_empty());
    assert!(registry.get(dir.path()).is_none());

    let b = open_book(&registry, dir.path());
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!b.closed());
    assert!(a.closed());
}

#[tokio::test]
async fn test_separate_registries_do_not_share() {
    let dir = tempdir().unwrap();
    let first = Registry::new();
    let second = Registry::new();
    let a = open_book(&first, dir.path());
    let b = open_book(&second, dir.path());

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(first.clone().get(dir.path()).is_some());
}

#[tokio::test]
async fn test_close_all() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let a = open_book(&registry, &dir.path().join("a"));
    let b = open_book(&registry, &dir.path().join("b"));

    registry.close_all();
    assert!(a.closed());
    assert!(b.closed());
    assert!(registry.is_empty());
}

#[test]
fn test_open_outside_runtime_fails() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let err = registry.open(LogBookOptions::new(dir.path())).unwrap_err();
    assert!(matches!(err, Error::NoRuntime));
}

#[tokio::test]
async fn test_open_on_file_path_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, "x").unwrap();

    let registry = Registry::new();
    let err = registry.open(LogBookOptions::new(&file)).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
