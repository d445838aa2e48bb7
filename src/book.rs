use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::channel::{Channel, IntoChannel};
use crate::cursor::{self, Cursor, Query};
use crate::error::{Error, Result};
use crate::options::{LogBookBuilder, LogBookOptions};
use crate::registry::{self, Table};
use crate::rotation::{self, Check};
use crate::timer::LongTimer;
use crate::value::Value;
use crate::writer::{ChannelState, Drain, StreamSettings};

/// How often [`LogBook::flush`] re-checks for outstanding writes.
const SETTLE_POLL: Duration = Duration::from_millis(2);

/// An append-only log book with four channels under one root directory.
///
/// ```text
/// <root>/
///   log/    log.log    log_<epochMillis>.log ...
///   error/  error.log  error_<epochMillis>.log ...
///   info/   info.log   info_<epochMillis>.log ...
///   warn/   warn.log   warn_<epochMillis>.log ...
/// ```
///
/// Writes are synchronous and never fail once the channel is known: each
/// entry is framed with a timestamp and handed to the channel's append
/// stream, or queued while that stream is under backpressure. When a
/// rotation interval is configured, every channel's active file is checked
/// on a timer and renamed (or deleted, if empty) once it is older than the
/// interval. Rotated files can be read back or deleted by time range.
///
/// Log books are obtained from a [`Registry`](crate::Registry), which keeps
/// at most one live instance per directory. After [`close`](Self::close),
/// writes are dropped and cursors come back empty.
///
/// # Delivery
///
/// Transient I/O failures (opening, writing, renaming, deleting) are logged
/// through the `log` facade and otherwise ignored; the next write or the
/// next rotation cycle tries again. Entries hitting a failing stream are
/// lost. This trades delivery guarantees for a write path that never blocks
/// or errors.
pub struct LogBook {
    me: Weak<LogBook>,
    root: PathBuf,
    rotation: Option<Duration>,
    settings: StreamSettings,
    closed: Arc<AtomicBool>,
    channels: [Mutex<ChannelState>; 4],
    timers: Mutex<[Option<LongTimer>; 4]>,
    shutdown: CancellationToken,
    registry: Weak<Table>,
}

impl std::fmt::Debug for LogBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBook")
            .field("root", &self.root)
            .field("rotation", &self.rotation)
            .field("closed", &self.closed())
            .finish()
    }
}

impl LogBook {
    /// Start configuring a log book rooted at `dir`.
    pub fn builder(dir: impl AsRef<Path>) -> LogBookBuilder {
        LogBookBuilder::new(dir)
    }

    /// Build the instance and arm the first rotation check per channel.
    /// The directory layout must already exist.
    pub(crate) fn start(
        root: PathBuf,
        options: &LogBookOptions,
        registry: Weak<Table>,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let book = Arc::new_cyclic(|me| LogBook {
            me: me.clone(),
            channels: Channel::ALL.map(|c| Mutex::new(ChannelState::new(c.active_path(&root)))),
            root,
            rotation: options.rotation_interval(),
            settings: StreamSettings {
                runtime,
                high_water_mark: options.high_water_mark,
            },
            closed: Arc::new(AtomicBool::new(false)),
            timers: Mutex::new([None, None, None, None]),
            shutdown: CancellationToken::new(),
            registry,
        });
        if book.rotation.is_some() {
            for channel in Channel::ALL {
                book.schedule(channel, Duration::ZERO);
            }
        }
        Ok(book)
    }

    /// Root directory (canonicalized).
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// The configured rotation interval, if rotation is enabled.
    pub fn rotation(&self) -> Option<Duration> {
        self.rotation
    }

    /// Directory holding `channel`'s files.
    pub fn channel_dir(&self, channel: Channel) -> PathBuf {
        channel.dir(&self.root)
    }

    /// Path of `channel`'s active file.
    pub fn active_path(&self, channel: Channel) -> PathBuf {
        channel.active_path(&self.root)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of entries waiting for `channel`'s stream to drain.
    pub fn queued(&self, channel: Channel) -> usize {
        self.state(channel).lock().queued()
    }

    /// Append one entry to a channel.
    ///
    /// The entry is written immediately if the channel's stream accepts
    /// data, otherwise queued behind earlier entries. Its timestamp is taken
    /// when it is actually framed. A no-op once the log book is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] for a channel name that is not
    /// `log`, `error`, `info` or `warn`.
    pub fn write<C: IntoChannel>(&self, channel: C, entry: Vec<Value>) -> Result<()> {
        let channel = channel.into_channel()?;
        self.append(channel, entry);
        Ok(())
    }

    /// Append an entry to the `log` channel.
    pub fn log<I>(&self, values: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.append(Channel::Log, values.into_iter().map(Into::into).collect());
    }

    /// Append an entry to the `error` channel.
    pub fn error<I>(&self, values: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.append(Channel::Error, values.into_iter().map(Into::into).collect());
    }

    /// Append an entry to the `info` channel.
    pub fn info<I>(&self, values: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.append(Channel::Info, values.into_iter().map(Into::into).collect());
    }

    /// Append an entry to the `warn` channel.
    pub fn warn<I>(&self, values: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.append(Channel::Warn, values.into_iter().map(Into::into).collect());
    }

    /// Lazily read `channel`'s rotated files whose timestamp is in `query`.
    ///
    /// Returns an empty cursor once the log book is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] for an unrecognized channel name.
    pub fn cursor<C: IntoChannel>(&self, channel: C, query: Query) -> Result<Cursor> {
        let channel = channel.into_channel()?;
        if self.closed() {
            return Ok(Cursor::empty());
        }
        Ok(Cursor::new(
            self.channel_dir(channel),
            query,
            Arc::clone(&self.closed),
        ))
    }

    /// Delete `channel`'s rotated files whose timestamp is in `query`.
    ///
    /// Returns the number of files removed; `0` once the log book is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] for an unrecognized channel name.
    pub async fn delete<C: IntoChannel>(&self, channel: C, query: Query) -> Result<usize> {
        let channel = channel.into_channel()?;
        if self.closed() {
            return Ok(0);
        }
        Ok(cursor::remove_range(&self.channel_dir(channel), query).await)
    }

    /// Wait until every channel has no queued entries and its stream has
    /// written everything it accepted.
    pub async fn flush(&self) {
        loop {
            let settled = self.channels.iter().all(|c| c.lock().is_settled());
            if settled {
                return;
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    /// Close the log book.
    ///
    /// Cancels all rotation timers, drops queued entries, closes every
    /// stream (bytes already accepted are still written) and removes the
    /// instance from its registry. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        for timer in self.timers.lock().iter_mut() {
            if let Some(timer) = timer.take() {
                timer.cancel();
            }
        }
        for (channel, state) in Channel::ALL.iter().zip(&self.channels) {
            let dropped = state.lock().release();
            if dropped > 0 {
                debug!("logbook: dropped {dropped} queued {channel} entries on close");
            }
        }
        registry::unregister(&self.registry, &self.root, self);
        info!("logbook: closed {}", self.root.display());
    }

    fn state(&self, channel: Channel) -> &Mutex<ChannelState> {
        &self.channels[channel.index()]
    }

    fn append(&self, channel: Channel, entry: Vec<Value>) {
        if self.closed() {
            return;
        }
        let drain = self.state(channel).lock().write(entry, &self.settings);
        if let Some(drain) = drain {
            self.watch_drain(channel, drain);
        }
    }

    fn watch_drain(&self, channel: Channel, drain: Drain) {
        let book = self.me.clone();
        let shutdown = self.shutdown.clone();
        self.settings.runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = drain => {
                    if let Some(book) = book.upgrade() {
                        book.resume(channel);
                    }
                }
            }
        });
    }

    fn resume(&self, channel: Channel) {
        if self.closed() {
            return;
        }
        let drain = self.state(channel).lock().resume(&self.settings);
        if let Some(drain) = drain {
            self.watch_drain(channel, drain);
        }
    }

    fn schedule(&self, channel: Channel, delay: Duration) {
        let book = self.me.clone();
        let timer = LongTimer::start(&self.settings.runtime, delay, &self.shutdown, async move {
            if let Some(book) = book.upgrade() {
                book.expire(channel).await;
            }
        });
        self.timers.lock()[channel.index()] = Some(timer);
    }

    /// One rotation check for `channel`, then re-arm.
    async fn expire(&self, channel: Channel) {
        let Some(interval) = self.rotation else {
            return;
        };
        if self.closed() {
            return;
        }

        let (path, opened_at) = {
            let state = self.state(channel).lock();
            (state.path().to_path_buf(), state.opened_at())
        };
        let check = match rotation::stat(&path, opened_at).await {
            Ok(file) => rotation::evaluate(interval, file, SystemTime::now()),
            Err(err) => {
                warn!("logbook: failed to stat {}: {err}", path.display());
                Check::Missing
            }
        };
        if matches!(check, Check::Rotate | Check::Discard) && !self.closed() {
            self.retire(channel, check);
        }

        if !self.closed() {
            self.schedule(channel, check.next_delay(interval));
        }
    }

    /// Close the active stream and rename or delete the active file.
    fn retire(&self, channel: Channel, check: Check) {
        let mut state = self.state(channel).lock();
        // Data may have landed since the stat; never delete it.
        let empty = state.buffered() == 0
            && fs::metadata(state.path()).is_ok_and(|m| m.len() == 0);
        state.close_stream();

        let result = if check == Check::Discard && empty {
            fs::remove_file(state.path()).map(|()| {
                debug!("logbook: removed empty {}", state.path().display());
            })
        } else {
            rotation::rotate_file(state.path(), SystemTime::now()).map(|to| {
                info!("logbook: rotated {} to {}", state.path().display(), to.display());
            })
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("logbook: failed to retire {}: {err}", state.path().display()),
        }
    }
}

impl Drop for LogBook {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
