use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extension shared by active and rotated files.
const EXTENSION: &str = "log";

/// One of the four fixed log categories.
///
/// Every channel owns a subdirectory of the log book root holding one
/// active file (`<name>.log`) and any number of rotated files
/// (`<name>_<epochMillis>.log`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Log,
    Error,
    Info,
    Warn,
}

impl Channel {
    /// All channels, in the order their directories are created and their
    /// rotation checks are scheduled.
    pub const ALL: [Channel; 4] = [Channel::Log, Channel::Error, Channel::Info, Channel::Warn];

    /// The channel name as used for directories and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Log => "log",
            Channel::Error => "error",
            Channel::Info => "info",
            Channel::Warn => "warn",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Directory holding this channel's files under `root`.
    pub fn dir(self, root: &Path) -> PathBuf {
        root.join(self.as_str())
    }

    /// Path of this channel's active file under `root`.
    pub fn active_path(self, root: &Path) -> PathBuf {
        self.dir(root).join(format!("{}.{EXTENSION}", self.as_str()))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == name)
            .ok_or_else(|| Error::UnknownChannel(name.to_string()))
    }
}

/// Anything that names a channel.
///
/// Implemented for [`Channel`] itself (infallible) and for string names,
/// which fail with [`Error::UnknownChannel`] when they don't match.
pub trait IntoChannel {
    fn into_channel(self) -> Result<Channel>;
}

impl IntoChannel for Channel {
    fn into_channel(self) -> Result<Channel> {
        Ok(self)
    }
}

impl IntoChannel for &str {
    fn into_channel(self) -> Result<Channel> {
        self.parse()
    }
}

impl IntoChannel for &String {
    fn into_channel(self) -> Result<Channel> {
        self.parse()
    }
}

impl IntoChannel for String {
    fn into_channel(self) -> Result<Channel> {
        self.parse()
    }
}

/// Build the rotated name for an active file: `<stem>_<millis>.<ext>`.
pub(crate) fn rotated_path(active: &Path, millis: u64) -> PathBuf {
    let stem = active
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match active.extension() {
        Some(ext) => format!("{stem}_{millis}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{millis}"),
    };
    active.with_file_name(name)
}

/// Extract the embedded rotation timestamp from a rotated file name.
///
/// Accepts `<prefix>_<digits>.log` with a non-empty prefix. Returns `None`
/// for the active file, foreign files, and timestamps that overflow `u64`.
///
/// ```
/// use logbook::parse_rotated_timestamp;
///
/// assert_eq!(parse_rotated_timestamp("error_1720765270800.log"), Some(1720765270800));
/// assert_eq!(parse_rotated_timestamp("error.log"), None);
/// assert_eq!(parse_rotated_timestamp("error_12ab.log"), None);
/// ```
pub fn parse_rotated_timestamp(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    let (prefix, digits) = stem.rsplit_once('_')?;
    if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trips_through_name() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        let err = "debug".parse::<Channel>().unwrap_err();
        assert!(matches!(err, Error::UnknownChannel(ref name) if name == "debug"));
        assert_eq!(err.to_string(), "Incorrect channel debug");
    }

    #[test]
    fn test_active_path_layout() {
        let root = Path::new("/var/logs");
        assert_eq!(
            Channel::Warn.active_path(root),
            PathBuf::from("/var/logs/warn/warn.log")
        );
    }

    #[test]
    fn test_rotated_path_inserts_timestamp_before_extension() {
        let active = Path::new("/tmp/app.v2/error/error.log");
        assert_eq!(
            rotated_path(active, 1234),
            PathBuf::from("/tmp/app.v2/error/error_1234.log")
        );
    }

    #[test]
    fn test_parse_rotated_timestamp() {
        assert_eq!(parse_rotated_timestamp("info_100.log"), Some(100));
        assert_eq!(parse_rotated_timestamp("a_b_200.log"), Some(200));
        assert_eq!(parse_rotated_timestamp("_300.log"), None);
        assert_eq!(parse_rotated_timestamp("info_.log"), None);
        assert_eq!(parse_rotated_timestamp("info_100.txt"), None);
        assert_eq!(parse_rotated_timestamp("info_100.log.tmp"), None);
        assert_eq!(parse_rotated_timestamp("info_-1.log"), None);
        assert_eq!(
            parse_rotated_timestamp("info_99999999999999999999999.log"),
            None
        );
    }
}
