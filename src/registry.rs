//! Process-scoped table of live log books, keyed by root directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use log::info;
use parking_lot::Mutex;

use crate::book::LogBook;
use crate::channel::Channel;
use crate::error::Result;
use crate::options::LogBookOptions;

pub(crate) type Table = Mutex<HashMap<PathBuf, Arc<LogBook>>>;

/// Owns at most one live [`LogBook`] per root directory.
///
/// Opening a directory that already has a live log book returns that same
/// instance; closing a log book removes it from the table. Clones share the
/// table.
///
/// ```no_run
/// # async fn demo() -> logbook::Result<()> {
/// use logbook::{LogBookOptions, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// let a = registry.open(LogBookOptions::new("logs"))?;
/// let b = registry.open(LogBookOptions::new("logs"))?;
/// assert!(Arc::ptr_eq(&a, &b));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    table: Arc<Table>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("directories", &self.table.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live log book for `options.directory`, or create the
    /// directory layout and start a new one.
    ///
    /// Must be called from within a Tokio runtime. Options of a second open
    /// for the same directory are ignored in favor of the live instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or no runtime
    /// is available.
    pub fn open(&self, options: LogBookOptions) -> Result<Arc<LogBook>> {
        let mut table = self.table.lock();
        if let Some(book) = lookup(&table, &options.directory) {
            return Ok(book);
        }

        create_layout(&options.directory)?;
        let root = fs::canonicalize(&options.directory)?;
        if let Some(book) = table.get(&root) {
            return Ok(Arc::clone(book));
        }

        let book = LogBook::start(root.clone(), &options, Arc::downgrade(&self.table))?;
        info!("logbook: opened {}", root.display());
        table.insert(root, Arc::clone(&book));
        Ok(book)
    }

    /// The live log book for `dir`, if any.
    pub fn get(&self, dir: impl AsRef<Path>) -> Option<Arc<LogBook>> {
        lookup(&self.table.lock(), dir.as_ref())
    }

    /// Number of live log books.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Close every live log book.
    pub fn close_all(&self) {
        // Collect first: closing a book takes the table lock itself.
        let books: Vec<_> = self.table.lock().values().cloned().collect();
        for book in books {
            book.close();
        }
    }
}

fn lookup(table: &HashMap<PathBuf, Arc<LogBook>>, dir: &Path) -> Option<Arc<LogBook>> {
    let key = fs::canonicalize(dir).ok()?;
    table.get(&key).cloned()
}

/// Create the root and per-channel directories if absent.
fn create_layout(root: &Path) -> Result<()> {
    for channel in Channel::ALL {
        fs::create_dir_all(channel.dir(root))?;
    }
    Ok(())
}

/// Remove `book` from the table behind `table`, if it is still registered.
pub(crate) fn unregister(table: &Weak<Table>, root: &Path, book: &LogBook) {
    let Some(table) = table.upgrade() else {
        return;
    };
    let mut table = table.lock();
    if table
        .get(root)
        .is_some_and(|live| std::ptr::eq(Arc::as_ptr(live), book))
    {
        table.remove(root);
    }
}
