//! Error and Result types for log book operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for log book operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for log book operations.
///
/// Most failures inside the engine are transient I/O problems that get
/// logged and swallowed. The variants here are the few that reach a caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The channel name is not one of `log`, `error`, `info`, `warn`.
    #[error("Incorrect channel {0}")]
    UnknownChannel(String),

    /// Creating the directory layout failed while opening a log book.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A log book was opened outside of a Tokio runtime.
    #[error("a log book must be opened from within a Tokio runtime")]
    NoRuntime,
}
