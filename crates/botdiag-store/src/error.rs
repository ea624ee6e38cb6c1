//! Error types for the document-store client and exporter.

use std::path::PathBuf;

/// Document-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Server answered with a non-2xx status.
    #[error("{method} {path} returned HTTP {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("network error: {context}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// Body was not a valid view response.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Export file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            context: "request failed".to_string(),
            source: err,
        }
    }
}

/// Result type for document-store operations.
pub type StoreResult<T> = Result<T, StoreError>;
