mod common;

use common::{eventually, open_book, rotated_timestamps};
use logbook::{Channel, LogBook, LogBookOptions, Query, Registry};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::tempdir;

const INTERVAL: Duration = Duration::from_millis(200);
const PATIENCE: Duration = Duration::from_secs(10);

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expired_file_is_rotated_with_timestamp() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let book = LogBook::builder(dir.path())
        .rotation(INTERVAL)
        .open(&registry)
        .unwrap();

    let before = now_millis();
    book.error(["rotate me"]);
    book.flush().await;

    assert!(
        eventually(PATIENCE, || !rotated_timestamps(&book, Channel::Error).is_empty()).await,
        "active file was never rotated"
    );
    let stamps = rotated_timestamps(&book, Channel::Error);
    assert_eq!(stamps.len(), 1);
    // Filesystem timestamps may trail the system clock by a tick.
    assert!(stamps[0] + 50 >= before + INTERVAL.as_millis() as u64);
    assert!(stamps[0] <= now_millis());

    let logs = book.cursor(Channel::Error, Query::new()).unwrap().collect().await;
    assert_eq!(logs.len(), 1);
    assert!(logs[0].contents.contains("rotate me"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_after_rotation_starts_fresh_active_file() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let book = LogBook::builder(dir.path())
        .rotation(INTERVAL)
        .open(&registry)
        .unwrap();

    book.log(["old"]);
    book.flush().await;
    assert!(eventually(PATIENCE, || !book.active_path(Channel::Log).exists()).await);

    book.log(["new"]);
    book.flush().await;
    let active = std::fs::read_to_string(book.active_path(Channel::Log)).unwrap();
    assert!(active.contains("new"));
    assert!(!active.contains("old"));

    let logs = book.cursor(Channel::Log, Query::new()).unwrap().collect().await;
    assert!(logs.iter().any(|log| log.contents.contains("old")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expired_empty_file_is_deleted() {
    let dir = tempdir().unwrap();
    let warn_dir = dir.path().join("warn");
    std::fs::create_dir_all(&warn_dir).unwrap();
    let active = warn_dir.join("warn.log");
    std::fs::write(&active, "").unwrap();

    let registry = Registry::new();
    let book = LogBook::builder(dir.path())
        .rotation(INTERVAL)
        .open(&registry)
        .unwrap();

    assert!(
        eventually(PATIENCE, || !active.exists()).await,
        "empty active file was never deleted"
    );
    assert!(rotated_timestamps(&book, Channel::Warn).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fresh_file_is_left_alone() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let book = LogBook::builder(dir.path())
        .rotation(Duration::from_secs(3600))
        .open(&registry)
        .unwrap();

    book.info(["stay"]);
    book.flush().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(book.active_path(Channel::Info).exists());
    assert!(rotated_timestamps(&book, Channel::Info).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_interval_never_rotates() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let book = open_book(&registry, dir.path());
    assert_eq!(book.rotation(), None);

    book.info(["forever"]);
    book.flush().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(book.active_path(Channel::Info).exists());
    assert!(rotated_timestamps(&book, Channel::Info).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_interval_disables_rotation() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let mut options = LogBookOptions::new(dir.path());
    options.rotation = Some(Duration::ZERO);
    let book = registry.open(options).unwrap();

    assert_eq!(book.rotation(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_stops_rotation() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let book = LogBook::builder(dir.path())
        .rotation(INTERVAL)
        .open(&registry)
        .unwrap();

    book.error(["kept in place"]);
    book.flush().await;
    book.close();

    tokio::time::sleep(INTERVAL * 4).await;
    assert!(book.active_path(Channel::Error).exists());
    assert!(rotated_timestamps(&book, Channel::Error).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rotation_under_continuous_writes_loses_nothing() {
    let dir = tempdir().unwrap();
    let registry = Registry::new();
    let book = LogBook::builder(dir.path())
        .rotation(Duration::from_millis(100))
        .open(&registry)
        .unwrap();

    for i in 0..40 {
        book.log([format!("line-{i}")]);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    book.flush().await;
    book.close();
    // Let streams closed by rotation finish their writes.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut all = String::new();
    for entry in std::fs::read_dir(book.channel_dir(Channel::Log)).unwrap() {
        all.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    for i in 0..40 {
        assert!(all.contains(&format!("line-{i} \n")), "line-{i} missing");
    }
}
