//! Reading FOM definition documents into generic ordered values

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::codec::DocumentCodec;
use super::error::{DocumentError, DocumentResult};

/// Reads FOM definition documents from disk.
///
/// Documents are returned as [`serde_json::Value`] regardless of codec, so
/// downstream code never cares whether a model was written as JSON or YAML.
/// Key order is preserved; rule order inside a document is significant.
pub struct DocumentStore;

impl DocumentStore {
    /// Read a document, resolving the codec from the file extension
    pub fn read(path: &Path) -> DocumentResult<Value> {
        let codec = DocumentCodec::from_path(path)?;
        Self::read_with(path, codec)
    }

    /// Read a document with an explicitly chosen codec
    pub fn read_with(path: &Path, codec: DocumentCodec) -> DocumentResult<Value> {
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Read document {} ({} bytes, {})", path.display(), text.len(), codec);

        match codec {
            DocumentCodec::Json => {
                serde_json::from_str(&text).map_err(|e| DocumentError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            DocumentCodec::Yaml => {
                serde_yaml::from_str(&text).map_err(|e| DocumentError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        }
    }
}
