//! Error type for the editor core.
//!
//! Everything here is recoverable: the runtime turns these into status-line
//! or overlay messages and keeps running. Programming errors (same-mode
//! transitions, a second command session) are panics, not variants.

use std::io;
use std::path::PathBuf;

/// Errors produced by buffer file I/O, configuration loading and commands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A configuration file exists but could not be read or parsed.
    #[error("config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A go-to-line target that is not a line of the document.
    #[error("invalid line: {0}")]
    InvalidLine(String),

    /// A find/replace pattern that does not compile.
    #[error(transparent)]
    Pattern(#[from] regex::Error),

    /// Saving a buffer that was never given a file name.
    #[error("no file name")]
    NoPath,
}

/// Shorthand for results in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
