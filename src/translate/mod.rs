//! The two translators between attributes and paths
//!
//! This module provides functionality to:
//! - generate concrete paths from attribute selections
//!   ([`AttributesToPaths`], backed by an indexed rule-row store)
//! - recover attributes from concrete directory trees
//!   ([`PathToAttributes`], backed by per-segment compiled matchers)
//!
//! Both are built from an immutable [`FomModel`](crate::model::FomModel) for
//! a fixed query context; construction does all the expensive work (table
//! and regex compilation) and instances are reused across many queries.
//! After construction they are read-only and safe to share across threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use fom_core::{AttributesToPaths, QueryContext, Selection};
//!
//! let paths = AttributesToPaths::new(&model, QueryContext::new());
//! for (path, attributes) in paths.find_paths(&Selection::new().with("subject", "S1")) {
//!     println!("{path} {attributes:?}");
//! }
//! ```

mod config;
mod error;
mod generator;
mod matcher;
mod table;

pub use config::{AttrSelector, MatchOptions, QueryContext, Selection};
pub use error::{TranslateError, TranslateResult};
pub use generator::{AttributesToPaths, FindPaths};
pub use matcher::{DirectoryMatches, MatchedEntry, PathToAttributes};
