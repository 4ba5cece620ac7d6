//! Directory tree capture and snapshot caching
//!
//! The path-to-attributes translator never touches the filesystem while
//! matching; it consumes a [`DirectoryTree`] captured up front. This module
//! provides:
//! - the tree structure itself (`{name: [stat_or_null, subtree_or_null]}`
//!   on the wire)
//! - a one-shot filesystem scan with cooperative cancellation
//! - snapshot caching as plain or ZIP-compressed JSON

mod error;
mod scan;
mod snapshot;
mod types;

pub use error::{TreeError, TreeResult};
pub use scan::ScanOptions;
pub use snapshot::SnapshotCodec;
pub use types::{DirEntry, DirectoryTree, FileStat};
