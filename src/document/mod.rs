//! FOM definition document reading
//!
//! A file organization model is declared in a JSON or YAML document. This
//! module reads such documents into a generic ordered key-value structure
//! ([`serde_json::Value`] with key order preserved) that the model importer
//! and the manager consume.

mod codec;
mod error;
mod store;

pub use codec::DocumentCodec;
pub use error::{DocumentError, DocumentResult};
pub use store::DocumentStore;
