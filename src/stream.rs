//! Append-mode file stream with a buffered-bytes high-water mark.
//!
//! ## Architecture
//!
//! Chunks handed to [`LogStream::write`] go through an unbounded channel to a
//! flusher task that owns the file. The stream counts bytes that have been
//! accepted but not yet written; once that count reaches the high-water mark,
//! `write` reports backpressure and the caller is expected to wait for
//! [`LogStream::drained`] before writing more.
//!
//! ```text
//! ┌──────────────┐   mpsc    ┌──────────────┐   append   ┌────────────┐
//! │  LogStream   │ ────────► │   flusher    │ ─────────► │ <name>.log │
//! │ (write side) │           │ (tokio task) │            │            │
//! └──────────────┘           └──────────────┘            └────────────┘
//!        ▲                          │
//!        └──────── drain ───────────┘
//! ```
//!
//! Dropping the stream closes the channel; the flusher writes whatever is
//! still queued to the file it already holds open and then exits.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use log::{debug, warn};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

struct StreamShared {
    /// Bytes accepted by `write` but not yet written to the file.
    buffered: AtomicUsize,
    high_water_mark: usize,
    /// Set when a write reported backpressure; cleared when drain fires.
    needs_drain: AtomicBool,
    drain: Notify,
    /// Opening or writing the file failed; every later chunk is dropped.
    failed: AtomicBool,
}

impl StreamShared {
    fn consume(&self, len: usize) {
        let before = self.buffered.fetch_sub(len, Ordering::AcqRel);
        if before == len && self.needs_drain.swap(false, Ordering::AcqRel) {
            self.drain.notify_one();
        }
    }
}

/// Write half of an append-mode file stream.
pub(crate) struct LogStream {
    id: u64,
    path: PathBuf,
    shared: Arc<StreamShared>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl LogStream {
    /// Open `path` for appending, spawning the flusher on `runtime`.
    ///
    /// The file is opened (and created if missing) by the flusher; an open
    /// failure marks the stream unwritable rather than failing here.
    pub(crate) fn open(path: &Path, high_water_mark: usize, runtime: &Handle) -> Self {
        let shared = Arc::new(StreamShared {
            buffered: AtomicUsize::new(0),
            high_water_mark: high_water_mark.max(1),
            needs_drain: AtomicBool::new(false),
            drain: Notify::new(),
            failed: AtomicBool::new(false),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(flush_loop(path.to_path_buf(), Arc::clone(&shared), rx));
        debug!("logbook: opened stream on {}", path.display());
        LogStream {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            path: path.to_path_buf(),
            shared,
            tx,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Whether the stream can still accept chunks.
    pub(crate) fn writable(&self) -> bool {
        !self.shared.failed.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Bytes accepted but not yet on disk.
    pub(crate) fn buffered(&self) -> usize {
        self.shared.buffered.load(Ordering::Acquire)
    }

    /// Queue a chunk for the file.
    ///
    /// The chunk is always accepted. Returns `false` when the buffered byte
    /// count has reached the high-water mark; the caller should hold further
    /// writes until [`drained`](Self::drained) resolves.
    pub(crate) fn write(&self, chunk: Vec<u8>) -> bool {
        let len = chunk.len();
        let total = self.shared.buffered.fetch_add(len, Ordering::AcqRel) + len;
        let below = total < self.shared.high_water_mark;
        if !below {
            // Must be visible before the flusher can consume this chunk.
            self.shared.needs_drain.store(true, Ordering::Release);
        }
        if self.tx.send(chunk).is_err() {
            warn!(
                "logbook: stream for {} is closed, entry dropped",
                self.path.display()
            );
            self.shared.consume(len);
        }
        below
    }

    /// Resolves once every buffered byte has been written after a write
    /// reported backpressure.
    pub(crate) fn drained(&self) -> impl Future<Output = ()> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        async move { shared.drain.notified().await }
    }
}

async fn flush_loop(
    path: PathBuf,
    shared: Arc<StreamShared>,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => Some(file),
        Err(err) => {
            warn!("logbook: failed to open {}: {err}", path.display());
            shared.failed.store(true, Ordering::Release);
            None
        }
    };

    while let Some(chunk) = rx.recv().await {
        if let Some(f) = file.as_mut() {
            let written = async {
                f.write_all(&chunk).await?;
                f.flush().await
            }
            .await;
            if let Err(err) = written {
                warn!("logbook: write to {} failed: {err}", path.display());
                shared.failed.store(true, Ordering::Release);
                file = None;
            }
        }
        shared.consume(chunk.len());
    }

    if let Some(mut f) = file {
        if let Err(err) = f.sync_data().await {
            debug!("logbook: sync of {} failed: {err}", path.display());
        }
    }
    debug!("logbook: closed stream on {}", path.display());
}
