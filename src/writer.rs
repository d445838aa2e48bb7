//! Per-channel write queue and backpressure state.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::SystemTime;

use chrono::Utc;
use tokio::runtime::Handle;

use crate::format;
use crate::stream::LogStream;
use crate::value::Value;

/// Settings shared by every stream a log book opens.
#[derive(Debug, Clone)]
pub(crate) struct StreamSettings {
    pub runtime: Handle,
    pub high_water_mark: usize,
}

/// A future that resolves when the stream a channel paused on has drained.
pub(crate) type Drain = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Mutable state of one channel: its stream, pending entries and pause flag.
///
/// Invariants:
/// - at most one open stream at a time;
/// - while `paused` or the queue is non-empty, new entries go to the back
///   of the queue, so entries reach the stream in call order;
/// - exactly one drain watcher is outstanding while `paused`.
pub(crate) struct ChannelState {
    path: PathBuf,
    stream: Option<LogStream>,
    queue: VecDeque<Vec<Value>>,
    paused: bool,
    opened_at: Option<SystemTime>,
}

impl ChannelState {
    pub(crate) fn new(path: PathBuf) -> Self {
        ChannelState {
            path,
            stream: None,
            queue: VecDeque::new(),
            paused: false,
            opened_at: None,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// When a stream was first opened on the current active file.
    pub(crate) fn opened_at(&self) -> Option<SystemTime> {
        self.opened_at
    }

    #[cfg(test)]
    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// No entries queued and nothing buffered in the stream.
    pub(crate) fn is_settled(&self) -> bool {
        self.queue.is_empty() && self.stream.as_ref().is_none_or(|s| s.buffered() == 0)
    }

    /// Bytes accepted by the stream but not yet written.
    pub(crate) fn buffered(&self) -> usize {
        self.stream.as_ref().map_or(0, LogStream::buffered)
    }

    /// Accept an entry for this channel.
    ///
    /// Returns a drain future when this write put the channel into the
    /// paused state; the caller must call [`resume`](Self::resume) once it
    /// resolves.
    pub(crate) fn write(&mut self, entry: Vec<Value>, settings: &StreamSettings) -> Option<Drain> {
        self.ensure_stream(settings);
        if self.paused || !self.queue.is_empty() {
            self.queue.push_back(entry);
            return None;
        }
        self.emit(&entry, settings)
    }

    /// Flush queued entries after a drain, one write per entry, until the
    /// queue is empty or the stream pushes back again.
    pub(crate) fn resume(&mut self, settings: &StreamSettings) -> Option<Drain> {
        self.paused = false;
        while let Some(entry) = self.queue.pop_front() {
            if let Some(drain) = self.emit(&entry, settings) {
                return Some(drain);
            }
        }
        None
    }

    /// Drop the current stream. Bytes it already accepted are still written
    /// to the file it holds open; the next write opens a fresh stream.
    pub(crate) fn close_stream(&mut self) {
        self.stream = None;
        self.opened_at = None;
    }

    /// Close the stream and drop every queued entry. Returns how many
    /// entries were dropped.
    pub(crate) fn release(&mut self) -> usize {
        self.close_stream();
        self.paused = false;
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    fn emit(&mut self, entry: &[Value], settings: &StreamSettings) -> Option<Drain> {
        let stream = self.ensure_stream(settings);
        let body = format::frame(entry, Utc::now());
        if stream.write(body.into_bytes()) {
            return None;
        }
        let drain = stream.drained();
        self.paused = true;
        Some(Box::pin(drain))
    }

    fn ensure_stream(&mut self, settings: &StreamSettings) -> &LogStream {
        let reopen = self.stream.as_ref().is_none_or(|s| !s.writable());
        if reopen {
            if let Some(prev) = self.stream.take() {
                log::debug!(
                    "logbook: replacing stream {} on {}",
                    prev.id(),
                    self.path.display()
                );
            }
            if self.opened_at.is_none() {
                self.opened_at = Some(SystemTime::now());
            }
        }
        self.stream.get_or_insert_with(|| {
            LogStream::open(&self.path, settings.high_water_mark, &settings.runtime)
        })
    }
}
