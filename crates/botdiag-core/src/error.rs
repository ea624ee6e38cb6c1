//! Error types for the collection phases.

use std::path::PathBuf;

/// Collection errors.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// A required root directory does not exist. The phase is skipped.
    #[error("missing root directory: {}", path.display())]
    MissingRoot { path: PathBuf },

    /// A single file could not be copied. The walk continues.
    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be listed or created.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be written.
    #[error("archive error: {message}")]
    Archive { message: String },
}

impl CollectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for collection operations.
pub type CollectResult<T> = Result<T, CollectError>;
