//! Time-ranged access to a channel's rotated files.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use futures::future::join_all;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::channel::parse_rotated_timestamp;

/// An inclusive range of rotation timestamps, in epoch milliseconds.
///
/// Defaults to everything: `from = 0`, `to = u64::MAX`.
///
/// ```
/// use logbook::Query;
///
/// let q = Query::new().from(150).to(250);
/// assert!(q.contains(200));
/// assert!(q.contains(250));
/// assert!(!q.contains(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub from: u64,
    pub to: u64,
}

impl Default for Query {
    fn default() -> Self {
        Query {
            from: 0,
            to: u64::MAX,
        }
    }
}

impl Query {
    /// A query matching every rotated file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inclusive lower bound.
    pub fn from(mut self, millis: u64) -> Self {
        self.from = millis;
        self
    }

    /// Set the inclusive upper bound.
    pub fn to(mut self, millis: u64) -> Self {
        self.to = millis;
        self
    }

    /// Whether `timestamp` lies within `[from, to]`.
    pub fn contains(&self, timestamp: u64) -> bool {
        self.from <= timestamp && timestamp <= self.to
    }

    /// Parse a file name and return its timestamp if it is a rotated file
    /// inside this range.
    pub fn matches(&self, name: &str) -> Option<u64> {
        parse_rotated_timestamp(name).filter(|ts| self.contains(*ts))
    }
}

/// The contents of one rotated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedLog {
    /// Rotation time embedded in the file name, in epoch milliseconds.
    pub timestamp: u64,
    pub path: PathBuf,
    pub contents: String,
}

/// A lazy, finite scan over a channel's rotated files.
///
/// The directory is listed once, on the first call to [`next`](Self::next);
/// files are then read one at a time as the cursor is advanced. Files come
/// back in directory listing order; sort by [`RotatedLog::timestamp`] when
/// order matters. Files that disappear or cannot be read between listing
/// and reading are skipped.
///
/// Once the owning log book is closed the cursor stops reading further
/// files.
#[derive(Debug)]
pub struct Cursor {
    dir: PathBuf,
    query: Query,
    closed: Arc<AtomicBool>,
    names: Option<VecDeque<String>>,
}

impl Cursor {
    pub(crate) fn new(dir: PathBuf, query: Query, closed: Arc<AtomicBool>) -> Self {
        Cursor {
            dir,
            query,
            closed,
            names: None,
        }
    }

    /// A cursor that yields nothing.
    pub(crate) fn empty() -> Self {
        Cursor {
            dir: PathBuf::new(),
            query: Query::default(),
            closed: Arc::new(AtomicBool::new(true)),
            names: Some(VecDeque::new()),
        }
    }

    /// Read the next matching rotated file.
    pub async fn next(&mut self) -> Option<RotatedLog> {
        if self.names.is_none() {
            if self.closed.load(Ordering::Acquire) {
                self.names = Some(VecDeque::new());
                return None;
            }
            self.names = Some(list(&self.dir).await.into());
        }
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            let name = self.names.as_mut()?.pop_front()?;
            let Some(timestamp) = self.query.matches(&name) else {
                continue;
            };
            let path = self.dir.join(&name);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    return Some(RotatedLog {
                        timestamp,
                        path,
                        contents: String::from_utf8_lossy(&bytes).into_owned(),
                    });
                }
                Err(err) => warn!("logbook: failed to read {}: {err}", path.display()),
            }
        }
    }

    /// Drain the cursor into a vector.
    pub async fn collect(mut self) -> Vec<RotatedLog> {
        let mut out = Vec::new();
        while let Some(log) = self.next().await {
            out.push(log);
        }
        out
    }

    /// Adapt the cursor into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = RotatedLog> + Send {
        futures::stream::unfold(self, |mut cursor| async move {
            cursor.next().await.map(|log| (log, cursor))
        })
    }
}

/// List file names in `dir`, swallowing errors into an empty listing.
async fn list(dir: &Path) -> Vec<String> {
    match read_names(dir).await {
        Ok(names) => names,
        Err(err) => {
            warn!("logbook: failed to list {}: {err}", dir.display());
            Vec::new()
        }
    }
}

async fn read_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Remove every rotated file in `dir` whose timestamp matches `query`.
///
/// Deletions run concurrently and are all awaited. Files that are already
/// gone are ignored; other failures are logged. Returns the number of files
/// removed.
pub(crate) async fn remove_range(dir: &Path, query: Query) -> usize {
    let targets: Vec<PathBuf> = list(dir)
        .await
        .into_iter()
        .filter(|name| query.matches(name).is_some())
        .map(|name| dir.join(name))
        .collect();

    let results = join_all(targets.iter().map(tokio::fs::remove_file)).await;
    targets
        .iter()
        .zip(results)
        .filter(|(path, result)| match result {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!("logbook: failed to delete {}: {err}", path.display());
                false
            }
        })
        .count()
}
