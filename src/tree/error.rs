//! Error types for directory trees and snapshots

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning or (de)serializing a directory tree
#[derive(Error, Debug)]
pub enum TreeError {
    /// Filesystem access failed
    #[error("Failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot content is not a valid serialized tree
    #[error("Failed to decode snapshot {path}: {message}")]
    Snapshot { path: PathBuf, message: String },

    /// ZIP archive error while reading or writing a compressed snapshot
    #[error("Snapshot archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// File extension does not map to a known snapshot codec
    #[error("No snapshot codec for path: {0}")]
    UnknownExtension(PathBuf),

    /// The scan was cancelled through its token
    #[error("Directory scan cancelled")]
    Cancelled,
}

/// Result type for tree operations
pub type TreeResult<T> = Result<T, TreeError>;
