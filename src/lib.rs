//! Logbook - an embedded, append-only log book.
//!
//! Entries are written to four fixed channels (`log`, `error`, `info`,
//! `warn`), each backed by its own directory of plain-text files. Active
//! files are rotated on a time basis and rotated files can be read back or
//! deleted by the epoch-millisecond timestamp embedded in their names.
//!
//! # Components
//!
//! - [`Registry`]: at most one live [`LogBook`] per directory
//! - [`LogBook`]: channel writes, rotation scheduling, range queries
//! - [`Cursor`]: lazy reader over rotated files
//! - [`Value`] / [`format()`]: rendering runtime values into entry text
//! - [`LongTimer`]: timers beyond the single-timer maximum
//!
//! # Example
//!
//! ```no_run
//! use logbook::{values, LogBook, Query, Registry};
//!
//! # async fn demo() -> logbook::Result<()> {
//! let registry = Registry::new();
//! let book = LogBook::builder("logs").rotation_ms(60_000).open(&registry)?;
//!
//! book.error(values!["request failed", 503, true]);
//! book.info(["started"]);
//!
//! let mut cursor = book.cursor("error", Query::new().from(1_720_000_000_000))?;
//! while let Some(rotated) = cursor.next().await {
//!     println!("{}: {}", rotated.timestamp, rotated.contents);
//! }
//! book.close();
//! # Ok(())
//! # }
//! ```

mod book;
mod channel;
mod cursor;
mod error;
mod format;
mod options;
mod registry;
mod rotation;
mod stream;
pub mod timer;
mod value;
mod writer;

pub use book::LogBook;
pub use channel::{Channel, IntoChannel, parse_rotated_timestamp};
pub use cursor::{Cursor, Query, RotatedLog};
pub use error::{Error, Result};
pub use format::{FormatError, PARSE_FAILURE, format};
pub use options::{DEFAULT_HIGH_WATER_MARK, LogBookBuilder, LogBookOptions};
pub use registry::Registry;
pub use rotation::{Check, assess};
pub use timer::{LongTimer, MAX_TIMER_DELAY};
pub use value::{Projection, Value};
