//! Error types for model import and merge

use thiserror::Error;

use crate::document::DocumentError;

/// Errors that can occur while importing FOM documents into a model.
///
/// All of these are fatal at load time; a model that imported successfully
/// never raises them again during queries.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Document has no `fom_name` field
    #[error("Document has no 'fom_name' field")]
    MissingFomName,

    /// Two documents redefine an attribute incompatibly
    #[error("Conflicting redefinition of attribute '{0}'")]
    AttributeConflict(String),

    /// Shared pattern references form a cycle
    #[error("Shared pattern reference cycle involving '{0}'")]
    SharedPatternCycle(String),

    /// A `{name}` macro references no known shared pattern
    #[error("Unknown shared pattern '{name}' referenced from '{context}'")]
    SharedPatternUnknown { name: String, context: String },

    /// Document declares imports but no manager was provided to resolve them
    #[error("Document '{0}' declares imports but no manager was provided")]
    ManagerRequired(String),

    /// An imported model name resolves to no known document
    #[error("Unknown imported model '{0}'")]
    UnknownImport(String),

    /// A rule declaration does not have the expected shape
    #[error("Malformed rule in '{context}': {message}")]
    MalformedRule { context: String, message: String },

    /// A rule references an undeclared format or format list
    #[error("Unknown format or format list '{0}'")]
    UnknownFormat(String),

    /// A pattern contains a malformed `<attribute>` placeholder
    #[error("Malformed placeholder in pattern '{0}'")]
    BadPlaceholder(String),

    /// Reading the document file failed
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;
