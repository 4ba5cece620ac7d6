//! Error types for document reading

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a FOM definition document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Failed to read the document file
    #[error("Failed to read document: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid JSON/YAML
    #[error("Failed to parse document {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// File extension does not map to a known codec
    #[error("No document codec for path: {0}")]
    UnknownExtension(PathBuf),
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
