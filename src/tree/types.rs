//! In-memory directory tree representation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Subset of file metadata carried through scans and snapshots.
///
/// Serialized as a `(size, mode, mtime)` tuple to keep snapshots compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, u32, i64)", into = "(u64, u32, i64)")]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Unix permission/mode bits (0 on platforms without them)
    pub mode: u32,
    /// Modification time, seconds since the Unix epoch
    pub mtime: i64,
}

impl From<(u64, u32, i64)> for FileStat {
    fn from((size, mode, mtime): (u64, u32, i64)) -> Self {
        Self { size, mode, mtime }
    }
}

impl From<FileStat> for (u64, u32, i64) {
    fn from(s: FileStat) -> Self {
        (s.size, s.mode, s.mtime)
    }
}

/// One directory entry: optional metadata, optional subtree.
///
/// `children` is `Some` for directories (possibly empty) and `None` for
/// plain files. On the wire an entry is the pair
/// `[stat_or_null, subtree_or_null]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryRepr", into = "EntryRepr")]
pub struct DirEntry {
    pub stat: Option<FileStat>,
    pub children: Option<DirectoryTree>,
}

impl DirEntry {
    /// Whether this entry represents a directory
    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }
}

#[derive(Serialize, Deserialize)]
struct EntryRepr(Option<FileStat>, Option<DirectoryTree>);

impl From<EntryRepr> for DirEntry {
    fn from(EntryRepr(stat, children): EntryRepr) -> Self {
        Self { stat, children }
    }
}

impl From<DirEntry> for EntryRepr {
    fn from(e: DirEntry) -> Self {
        EntryRepr(e.stat, e.children)
    }
}

/// An in-memory directory listing, keyed by entry name.
///
/// This is the single structure both translators consume: a live filesystem
/// is walked once into a `DirectoryTree`, and snapshots round-trip through
/// the same shape (`{name: [stat_or_null, subtree_or_null]}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryTree {
    entries: BTreeMap<String, DirEntry>,
}

impl DirectoryTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain file entry
    pub fn add_file(&mut self, name: &str, stat: Option<FileStat>) -> &mut Self {
        self.entries.insert(
            name.to_string(),
            DirEntry { stat, children: None },
        );
        self
    }

    /// Add a directory entry with its subtree
    pub fn add_dir(&mut self, name: &str, stat: Option<FileStat>, subtree: DirectoryTree) -> &mut Self {
        self.entries.insert(
            name.to_string(),
            DirEntry {
                stat,
                children: Some(subtree),
            },
        );
        self
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.entries.get(name)
    }

    /// Iterate over entries in name order
    pub fn entries(&self) -> std::collections::btree_map::Iter<'_, String, DirEntry> {
        self.entries.iter()
    }

    /// Number of direct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, name: String, entry: DirEntry) {
        self.entries.insert(name, entry);
    }
}
