//! FOM discovery and loading
//!
//! A [`FomManager`] scans a configured search path for file organization
//! documents, maps model names to their defining documents, and resolves
//! transitive `fom_import` dependencies, either into a materialized
//! [`FomModel`] or into a single merged raw document.

mod error;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::{DocumentCodec, DocumentStore};
use crate::model::FomModel;

pub use error::{ManagerError, ManagerResult};

/// Sections merged across an import chain by [`FomManager::read_definition`]
const MERGED_SECTIONS: [&str; 6] = [
    "attribute_definitions",
    "formats",
    "format_lists",
    "shared_patterns",
    "patterns",
    "processes",
];

/// Discovers FOM documents and resolves import graphs.
pub struct FomManager {
    search_paths: Vec<PathBuf>,
    foms: BTreeMap<String, PathBuf>,
}

impl FomManager {
    /// Scan the given search paths and build the name → document mapping
    pub fn new(search_paths: Vec<PathBuf>) -> ManagerResult<Self> {
        let foms = Self::find_foms(&search_paths)?;
        info!("Discovered {} file organization models", foms.len());
        Ok(Self { search_paths, foms })
    }

    /// Discover FOM documents on the given search paths.
    ///
    /// Each candidate entry is either a directory containing
    /// `<entry>/<entry>.json|.yaml|.yml` or a bare document file. The first
    /// discovered document for a name wins: later search paths and entries
    /// never shadow an earlier mapping for the same `fom_name`.
    pub fn find_foms(search_paths: &[PathBuf]) -> ManagerResult<BTreeMap<String, PathBuf>> {
        let mut foms = BTreeMap::new();
        for search_path in search_paths {
            let listing = match fs::read_dir(search_path) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Skipping unreadable search path {}: {}", search_path.display(), e);
                    continue;
                }
            };
            let mut entries: Vec<PathBuf> = listing
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .collect();
            entries.sort();

            for entry in entries {
                let Some(candidate) = Self::candidate_document(&entry) else {
                    continue;
                };
                let document = DocumentStore::read(&candidate)?;
                let name = document
                    .get("fom_name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ManagerError::MissingFomName {
                        path: candidate.clone(),
                    })?;
                if foms.contains_key(name) {
                    debug!(
                        "Ignoring {} for '{}': already defined by an earlier entry",
                        candidate.display(),
                        name
                    );
                } else {
                    foms.insert(name.to_string(), candidate);
                }
            }
        }
        Ok(foms)
    }

    fn candidate_document(entry: &Path) -> Option<PathBuf> {
        if entry.is_dir() {
            let stem = entry.file_name()?.to_str()?;
            DocumentCodec::known_extensions()
                .iter()
                .map(|ext| entry.join(format!("{stem}.{ext}")))
                .find(|p| p.is_file())
        } else {
            let ext = entry.extension()?.to_str()?;
            DocumentCodec::known_extensions()
                .contains(&ext)
                .then(|| entry.to_path_buf())
        }
    }

    /// The search paths this manager was configured with
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Names of all discovered models
    pub fn fom_names(&self) -> impl Iterator<Item = &str> {
        self.foms.keys().map(String::as_str)
    }

    /// Defining document for a model name
    pub fn path_for(&self, name: &str) -> Option<&PathBuf> {
        self.foms.get(name)
    }

    /// Import the requested models (with their transitive imports) into one
    /// aggregate model.
    pub fn load_foms(&self, names: &[&str]) -> ManagerResult<FomModel> {
        let mut model = FomModel::new();
        for name in names {
            let path = self
                .path_for(name)
                .ok_or_else(|| ManagerError::UnknownFom((*name).to_string()))?
                .clone();
            model.import_file(&path, Some(self))?;
        }
        Ok(model)
    }

    /// Resolve a model's import graph into one merged raw document, without
    /// materializing a [`FomModel`].
    ///
    /// Dict-shaped sections deep-merge with the importing document winning
    /// over its ancestors on scalar leaves; `rules` lists concatenate with
    /// ancestor rules first.
    pub fn read_definition(&self, name: &str) -> ManagerResult<Value> {
        // Breadth-first over the import graph, nearest documents first.
        let mut documents = Vec::new();
        let mut queue = VecDeque::from([name.to_string()]);
        let mut visited = BTreeSet::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            let path = self
                .path_for(&current)
                .ok_or_else(|| ManagerError::UnknownFom(current.clone()))?;
            let document = DocumentStore::read(path)?;
            if let Some(imports) = document.get("fom_import").and_then(Value::as_array) {
                for dep in imports.iter().filter_map(Value::as_str) {
                    if visited.insert(dep.to_string()) {
                        queue.push_back(dep.to_string());
                    }
                }
            }
            documents.push(document);
        }

        let mut merged = documents[0].clone();
        if let Some(root) = merged.as_object_mut() {
            root.remove("fom_import");
            for ancestor in &documents[1..] {
                let Some(ancestor) = ancestor.as_object() else {
                    continue;
                };
                for (key, value) in ancestor {
                    if key == "fom_import" || key == "fom_name" || key == "rules" {
                        continue;
                    }
                    match root.get_mut(key) {
                        None => {
                            root.insert(key.clone(), value.clone());
                        }
                        Some(existing) if MERGED_SECTIONS.contains(&key.as_str()) => {
                            merge_under(existing, value, key)?
                        }
                        // Non-section keys keep the importing document's value.
                        Some(_) => {}
                    }
                }
            }
        }

        // Rule lists concatenate, dependency rules first.
        let mut rules = Vec::new();
        for document in documents.iter().rev() {
            if let Some(list) = document.get("rules").and_then(Value::as_array) {
                rules.extend(list.iter().cloned());
            }
        }
        if !rules.is_empty() {
            if let Some(root) = merged.as_object_mut() {
                root.insert("rules".to_string(), Value::Array(rules));
            }
        }
        Ok(merged)
    }
}

/// Deep-merge `ancestor` under `base`: maps merge recursively, scalar
/// conflicts keep `base` (the importing document wins), map-vs-scalar shape
/// conflicts are fatal.
fn merge_under(base: &mut Value, ancestor: &Value, key: &str) -> ManagerResult<()> {
    match (base, ancestor) {
        (Value::Object(base), Value::Object(ancestor)) => {
            for (k, v) in ancestor {
                match base.get_mut(k) {
                    None => {
                        base.insert(k.clone(), v.clone());
                    }
                    Some(existing) => merge_under(existing, v, k)?,
                }
            }
            Ok(())
        }
        (Value::Object(_), _) | (_, Value::Object(_)) => Err(ManagerError::MergeConflict {
            key: key.to_string(),
        }),
        // Scalar leaves present on both sides: the importing document wins.
        _ => Ok(()),
    }
}
