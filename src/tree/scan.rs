//! One-shot filesystem walk into a [`DirectoryTree`]

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;

use super::error::{TreeError, TreeResult};
use super::types::{DirEntry, DirectoryTree, FileStat};

/// Options for a filesystem scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Record file metadata in the tree (on by default)
    pub record_stat: bool,
    /// Cancellation token checked once per visited entry
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            record_stat: true,
            cancel: CancelToken::default(),
        }
    }
}

impl ScanOptions {
    /// Create scan options with metadata recording enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable metadata recording
    pub fn with_stat(mut self, enabled: bool) -> Self {
        self.record_stat = enabled;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl DirectoryTree {
    /// Walk `root` once and capture it as an in-memory tree.
    ///
    /// Unreadable directories degrade to an empty listing with a warning;
    /// the scan itself only fails when cancelled or when `root` cannot be
    /// listed at all.
    pub fn scan(root: &Path, options: &ScanOptions) -> TreeResult<DirectoryTree> {
        let listing = fs::read_dir(root).map_err(|source| TreeError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        scan_listing(root, listing, options)
    }
}

fn scan_listing(
    dir: &Path,
    listing: fs::ReadDir,
    options: &ScanOptions,
) -> TreeResult<DirectoryTree> {
    let mut tree = DirectoryTree::new();
    for entry in listing {
        if options.cancel.is_cancelled() {
            return Err(TreeError::Cancelled);
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        let metadata = entry.metadata().ok();
        let stat = if options.record_stat {
            metadata.as_ref().map(file_stat)
        } else {
            None
        };

        let is_dir = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
        let children = if is_dir {
            match fs::read_dir(&path) {
                Ok(sub) => Some(scan_listing(&path, sub, options)?),
                Err(e) => {
                    warn!("Cannot list {}: {} (treating as empty)", path.display(), e);
                    Some(DirectoryTree::new())
                }
            }
        } else {
            None
        };

        tree.insert(name, DirEntry { stat, children });
    }
    Ok(tree)
}

fn file_stat(metadata: &fs::Metadata) -> FileStat {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode()
    };
    #[cfg(not(unix))]
    let mode = 0;

    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    FileStat {
        size: metadata.len(),
        mode,
        mtime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_scan_captures_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("subj01")).unwrap();
        let mut f = File::create(dir.path().join("subj01/t1.nii")).unwrap();
        f.write_all(b"data").unwrap();

        let tree = DirectoryTree::scan(dir.path(), &ScanOptions::new()).unwrap();
        let subj = tree.get("subj01").unwrap();
        assert!(subj.is_dir());
        let file = subj.children.as_ref().unwrap().get("t1.nii").unwrap();
        assert!(!file.is_dir());
        assert_eq!(file.stat.unwrap().size, 4);
    }

    #[test]
    fn test_scan_without_stat() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("f")).unwrap();

        let tree =
            DirectoryTree::scan(dir.path(), &ScanOptions::new().with_stat(false)).unwrap();
        assert!(tree.get("f").unwrap().stat.is_none());
    }

    #[test]
    fn test_scan_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("f")).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err =
            DirectoryTree::scan(dir.path(), &ScanOptions::new().with_cancel(cancel)).unwrap_err();
        assert!(matches!(err, TreeError::Cancelled));
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let err = DirectoryTree::scan(Path::new("/nonexistent"), &ScanOptions::new());
        assert!(matches!(err, Err(TreeError::Io { .. })));
    }
}
