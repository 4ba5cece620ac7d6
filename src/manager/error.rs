//! Error types for model discovery and loading

use std::path::PathBuf;
use thiserror::Error;

use crate::document::DocumentError;
use crate::model::ModelError;

/// Errors that can occur while discovering and loading FOM documents
#[derive(Error, Debug)]
pub enum ManagerError {
    /// A candidate document does not declare `fom_name`
    #[error("Document {path} has no 'fom_name' field")]
    MissingFomName { path: PathBuf },

    /// A requested model name resolves to no discovered document
    #[error("Unknown file organization model '{0}'")]
    UnknownFom(String),

    /// A search path could not be listed
    #[error("Failed to list search path {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two documents in an import chain disagree on the shape of a key
    #[error("Cannot merge '{key}': mapping and scalar shapes conflict")]
    MergeConflict { key: String },

    /// Reading a document failed
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Importing a document into a model failed
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;
