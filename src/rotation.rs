//! Age-based rotation of a channel's active file.
//!
//! Each channel runs its own check cycle:
//!
//! ```text
//! SCHEDULED ──timer──► CHECKING ──► ROTATED | DELETED | NOOP ──► SCHEDULED
//!      │
//!      └── close ──► STOPPED
//! ```
//!
//! The decision itself ([`assess`]) is a pure function of the rotation
//! interval and the file's age and size; the engine performs the resulting
//! rename or delete and re-arms the timer with [`Check::next_delay`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::channel::rotated_path;

/// Outcome of one rotation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// The active file does not exist yet.
    Missing,
    /// The file is younger than the interval; check again after the
    /// remaining time so the next check lands on expiry.
    Fresh { remaining: Duration },
    /// The file is expired and has content: rename it.
    Rotate,
    /// The file is expired and empty: delete it.
    Discard,
}

impl Check {
    /// Delay until the next check for this outcome.
    pub fn next_delay(self, interval: Duration) -> Duration {
        match self {
            Check::Fresh { remaining } => remaining,
            Check::Missing | Check::Rotate | Check::Discard => interval,
        }
    }
}

/// Decide what to do with an active file of the given `age` and `size`.
///
/// A file is expired only when strictly older than `interval`.
pub fn assess(interval: Duration, age: Duration, size: u64) -> Check {
    if age <= interval {
        Check::Fresh {
            remaining: interval - age,
        }
    } else if size == 0 {
        Check::Discard
    } else {
        Check::Rotate
    }
}

/// Facts about the active file gathered by one stat.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileState {
    pub created: SystemTime,
    pub size: u64,
}

/// Stat the active file. `Ok(None)` when it does not exist.
///
/// Creation time comes from the filesystem birth time, then `opened_at`
/// (when this process first opened a stream on the file), then the
/// modification time.
pub(crate) async fn stat(path: &Path, opened_at: Option<SystemTime>) -> io::Result<Option<FileState>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let created = match (metadata.created(), opened_at) {
        (Ok(created), _) => created,
        (Err(_), Some(opened)) => opened,
        (Err(_), None) => metadata.modified()?,
    };
    Ok(Some(FileState {
        created,
        size: metadata.len(),
    }))
}

/// Evaluate a stat result against `interval` at time `now`.
pub(crate) fn evaluate(interval: Duration, state: Option<FileState>, now: SystemTime) -> Check {
    match state {
        None => Check::Missing,
        Some(state) => {
            // A birth time in the future (clock skew) counts as brand new.
            let age = now.duration_since(state.created).unwrap_or_default();
            assess(interval, age, state.size)
        }
    }
}

/// Rename the active file to its rotated name stamped with `now`.
pub(crate) fn rotate_file(active: &Path, now: SystemTime) -> io::Result<PathBuf> {
    let to = rotated_path(active, epoch_millis(now));
    std::fs::rename(active, &to)?;
    Ok(to)
}

pub(crate) fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
