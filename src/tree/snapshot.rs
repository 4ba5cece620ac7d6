//! Directory tree snapshot cache
//!
//! A scanned tree can be saved to disk and reloaded later, skipping the
//! filesystem walk. Snapshots are plain JSON or JSON inside a deflate ZIP
//! archive; the codec is an explicit choice, never probed.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{TreeError, TreeResult};
use super::types::DirectoryTree;

/// Name of the single entry inside a compressed snapshot archive
const ARCHIVE_ENTRY: &str = "tree.json";

/// Serialization format of a directory tree snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotCodec {
    /// Plain JSON file (`.json`)
    Json,
    /// JSON compressed into a ZIP archive (`.zip`)
    ZipJson,
}

impl SnapshotCodec {
    /// Resolve the codec from a file extension
    pub fn from_path(path: &Path) -> TreeResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(SnapshotCodec::Json),
            Some("zip") => Ok(SnapshotCodec::ZipJson),
            _ => Err(TreeError::UnknownExtension(path.to_path_buf())),
        }
    }
}

impl DirectoryTree {
    /// Load a snapshot, resolving the codec from the file extension
    pub fn load_snapshot(path: &Path) -> TreeResult<DirectoryTree> {
        let codec = SnapshotCodec::from_path(path)?;
        Self::load_snapshot_with(path, codec)
    }

    /// Load a snapshot with an explicitly chosen codec
    pub fn load_snapshot_with(path: &Path, codec: SnapshotCodec) -> TreeResult<DirectoryTree> {
        let text = match codec {
            SnapshotCodec::Json => read_file(path)?,
            SnapshotCodec::ZipJson => {
                let file = File::open(path).map_err(|source| TreeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let mut archive = zip::ZipArchive::new(file)?;
                let mut entry = archive.by_name(ARCHIVE_ENTRY)?;
                let mut text = String::new();
                entry.read_to_string(&mut text).map_err(|source| TreeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                text
            }
        };
        debug!("Loaded snapshot {} ({} bytes)", path.display(), text.len());
        serde_json::from_str(&text).map_err(|e| TreeError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save a snapshot, resolving the codec from the file extension
    pub fn save_snapshot(&self, path: &Path) -> TreeResult<()> {
        let codec = SnapshotCodec::from_path(path)?;
        self.save_snapshot_with(path, codec)
    }

    /// Save a snapshot with an explicitly chosen codec
    pub fn save_snapshot_with(&self, path: &Path, codec: SnapshotCodec) -> TreeResult<()> {
        let text = serde_json::to_string(self).map_err(|e| TreeError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        match codec {
            SnapshotCodec::Json => {
                let mut file = File::create(path).map_err(|source| TreeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                file.write_all(text.as_bytes()).map_err(|source| TreeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            SnapshotCodec::ZipJson => {
                let file = File::create(path).map_err(|source| TreeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let mut archive = zip::ZipWriter::new(file);
                archive.start_file(ARCHIVE_ENTRY, zip::write::SimpleFileOptions::default())?;
                archive.write_all(text.as_bytes()).map_err(|source| TreeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                archive.finish()?;
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> TreeResult<String> {
    std::fs::read_to_string(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileStat;

    fn sample_tree() -> DirectoryTree {
        let mut sub = DirectoryTree::new();
        sub.add_file(
            "t1.nii.gz",
            Some(FileStat {
                size: 1024,
                mode: 0o644,
                mtime: 1_700_000_000,
            }),
        );
        let mut tree = DirectoryTree::new();
        tree.add_dir("subj01", None, sub);
        tree
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let tree = sample_tree();

        tree.save_snapshot(&path).unwrap();
        let back = DirectoryTree::load_snapshot(&path).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_zip_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.zip");
        let tree = sample_tree();

        tree.save_snapshot(&path).unwrap();
        let back = DirectoryTree::load_snapshot(&path).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_unknown_snapshot_extension() {
        let err = DirectoryTree::load_snapshot(Path::new("cache.tar")).unwrap_err();
        assert!(matches!(err, TreeError::UnknownExtension(_)));
    }
}
