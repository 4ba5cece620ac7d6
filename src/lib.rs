//! FOM Core - file organization model engine
//!
//! A file organization model (FOM) is a declarative rule system mapping
//! between semantic attributes (subject, acquisition, processing step,
//! format, ...) and concrete file paths, in both directions. This crate
//! provides:
//! - Document reading (JSON/YAML definitions, via explicit codecs)
//! - Model discovery and import-graph resolution
//! - The normalized rule store (merged schemas, expanded shared patterns,
//!   flattened rules)
//! - Attribute→path generation over an indexed rule-row store
//! - Path→attribute recovery over captured directory trees

pub mod cancel;
pub mod document;
pub mod manager;
pub mod model;
pub mod translate;
pub mod tree;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use document::{DocumentCodec, DocumentError, DocumentStore};
pub use manager::{FomManager, ManagerError};
pub use model::{AttributeDefinition, FomModel, ModelError, PathTemplate, Rule};
pub use translate::{
    AttrSelector, AttributesToPaths, MatchOptions, PathToAttributes, QueryContext, Selection,
    TranslateError,
};
pub use tree::{DirEntry, DirectoryTree, FileStat, ScanOptions, SnapshotCodec, TreeError};
