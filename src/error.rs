//! Error types for dircompare

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the comparison engine can run into.
///
/// Listing and read failures are not necessarily fatal: during the real
/// comparison they are handed to an [`Interaction`](crate::interact::Interaction)
/// which decides whether to retry, skip (the affected item is then treated as
/// different) or cancel. `PathTooLong`, `OutOfMemory` and
/// `UnsupportedSourceCombination` always end the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read directory {path}: {source}")]
    DirectoryListingFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read file {path}: {source}")]
    ContentReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the name is too long: {path}")]
    PathTooLong { path: String },

    #[error("not enough memory to compare directories")]
    OutOfMemory,

    #[error("comparing by content is supported only between two disk directories")]
    UnsupportedSourceCombination,

    #[error("invalid mask {mask:?}: {reason}")]
    InvalidMask { mask: String, reason: String },

    #[error("configuration file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Errors the user may answer with retry/skip instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DirectoryListingFailed { .. } | Error::ContentReadFailed { .. }
        )
    }
}
