//! Document codec selection

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{DocumentError, DocumentResult};

/// Serialization format of a FOM definition document.
///
/// The codec is an explicit choice resolved once, from the file extension or
/// by the caller; nothing is probed at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCodec {
    /// JSON document (`.json`)
    Json,
    /// YAML document (`.yaml` / `.yml`)
    Yaml,
}

impl DocumentCodec {
    /// Resolve the codec from a file extension
    pub fn from_path(path: &Path) -> DocumentResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(DocumentCodec::Json),
            Some("yaml") | Some("yml") => Ok(DocumentCodec::Yaml),
            _ => Err(DocumentError::UnknownExtension(path.to_path_buf())),
        }
    }

    /// File extensions handled by any codec, in resolution order
    pub fn known_extensions() -> &'static [&'static str] {
        &["json", "yaml", "yml"]
    }
}

impl std::fmt::Display for DocumentCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentCodec::Json => write!(f, "json"),
            DocumentCodec::Yaml => write!(f, "yaml"),
        }
    }
}

impl std::str::FromStr for DocumentCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(DocumentCodec::Json),
            "yaml" | "yml" => Ok(DocumentCodec::Yaml),
            _ => Err(format!("Unknown document codec: {}", s)),
        }
    }
}
