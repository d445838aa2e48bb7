use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::book::LogBook;
use crate::error::Result;
use crate::registry::Registry;

/// Default per-stream buffered-bytes threshold before backpressure.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Construction options for a [`LogBook`].
///
/// Deserializes from the camel-cased form used by configuration files:
///
/// ```
/// use logbook::LogBookOptions;
/// use std::time::Duration;
///
/// let opts: LogBookOptions =
///     serde_json::from_str(r#"{"directory": "logs", "rotationIntervalMs": 5000}"#).unwrap();
/// assert_eq!(opts.rotation, Some(Duration::from_millis(5000)));
/// assert_eq!(opts.high_water_mark, logbook::DEFAULT_HIGH_WATER_MARK);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBookOptions {
    /// Root directory; one subdirectory per channel is created inside it.
    pub directory: PathBuf,

    /// Maximum age of an active file before it is rotated. `None` (or zero)
    /// disables rotation.
    #[serde(
        rename = "rotationIntervalMs",
        default,
        with = "millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub rotation: Option<Duration>,

    /// Buffered bytes per stream at which writes start queueing.
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
}

fn default_high_water_mark() -> usize {
    DEFAULT_HIGH_WATER_MARK
}

impl LogBookOptions {
    /// Options for `directory` with rotation disabled.
    pub fn new(directory: impl AsRef<Path>) -> Self {
        LogBookOptions {
            directory: directory.as_ref().to_path_buf(),
            rotation: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }

    /// The rotation interval, with a zero interval treated as unset.
    pub(crate) fn rotation_interval(&self) -> Option<Duration> {
        self.rotation.filter(|interval| !interval.is_zero())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_millis() as u64),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Builder for opening a [`LogBook`] through a [`Registry`].
///
/// ```no_run
/// # async fn demo() -> logbook::Result<()> {
/// use logbook::{LogBook, Registry};
/// use std::time::Duration;
///
/// let registry = Registry::new();
/// let book = LogBook::builder("logs")
///     .rotation(Duration::from_secs(24 * 60 * 60))
///     .open(&registry)?;
/// book.error(["boom"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LogBookBuilder {
    options: LogBookOptions,
}

impl LogBookBuilder {
    pub(crate) fn new(directory: impl AsRef<Path>) -> Self {
        LogBookBuilder {
            options: LogBookOptions::new(directory),
        }
    }

    /// Rotate active files older than `interval`.
    pub fn rotation(mut self, interval: Duration) -> Self {
        self.options.rotation = Some(interval);
        self
    }

    /// Rotate active files older than `millis` milliseconds.
    pub fn rotation_ms(self, millis: u64) -> Self {
        self.rotation(Duration::from_millis(millis))
    }

    /// Set the per-stream backpressure threshold in bytes.
    pub fn high_water_mark(mut self, bytes: usize) -> Self {
        self.options.high_water_mark = bytes;
        self
    }

    /// The options built so far.
    pub fn options(&self) -> &LogBookOptions {
        &self.options
    }

    /// Open (or fetch the live instance for) the configured directory.
    pub fn open(self, registry: &Registry) -> Result<Arc<LogBook>> {
        registry.open(self.options)
    }
}
