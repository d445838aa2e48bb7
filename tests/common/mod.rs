#![allow(dead_code)]

use logbook::{Channel, LogBook, LogBookOptions, Registry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn open_book(registry: &Registry, dir: &Path) -> Arc<LogBook> {
    registry.open(LogBookOptions::new(dir)).unwrap()
}

pub fn active_contents(book: &LogBook, channel: Channel) -> String {
    fs::read_to_string(book.active_path(channel)).unwrap_or_default()
}

/// Drop a rotated file with the given timestamp into a channel directory.
pub fn seed_rotated(book: &LogBook, channel: Channel, timestamp: u64, contents: &str) -> PathBuf {
    let path = book
        .channel_dir(channel)
        .join(format!("{}_{timestamp}.log", channel.as_str()));
    fs::write(&path, contents).unwrap();
    path
}

/// Timestamps of every rotated file in a channel directory, sorted.
pub fn rotated_timestamps(book: &LogBook, channel: Channel) -> Vec<u64> {
    let mut stamps: Vec<u64> = fs::read_dir(book.channel_dir(channel))
        .unwrap()
        .filter_map(|entry| {
            let name = entry.unwrap().file_name().into_string().ok()?;
            logbook::parse_rotated_timestamp(&name)
        })
        .collect();
    stamps.sort_unstable();
    stamps
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Entry bodies in file order: the value lines of every entry, joined.
pub fn entry_bodies(contents: &str) -> Vec<String> {
    contents
        .split("\n\n")
        .filter(|block| !block.is_empty())
        .map(|block| {
            block
                .lines()
                .skip(1)
                .map(|line| line.strip_suffix(' ').unwrap_or(line))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}
