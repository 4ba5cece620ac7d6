//! Selections, query contexts and matching options

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;

/// A value constraint for one attribute: a single value or any of several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrSelector {
    One(String),
    Any(Vec<String>),
}

impl AttrSelector {
    /// The values this selector accepts
    pub fn values(&self) -> &[String] {
        match self {
            AttrSelector::One(v) => std::slice::from_ref(v),
            AttrSelector::Any(vs) => vs,
        }
    }

    /// The single accepted value, if this selector is not a list
    pub fn as_one(&self) -> Option<&str> {
        match self {
            AttrSelector::One(v) => Some(v),
            AttrSelector::Any(_) => None,
        }
    }
}

impl From<&str> for AttrSelector {
    fn from(value: &str) -> Self {
        AttrSelector::One(value.to_string())
    }
}

impl From<String> for AttrSelector {
    fn from(value: String) -> Self {
        AttrSelector::One(value)
    }
}

impl From<Vec<String>> for AttrSelector {
    fn from(values: Vec<String>) -> Self {
        AttrSelector::Any(values)
    }
}

impl From<&[&str]> for AttrSelector {
    fn from(values: &[&str]) -> Self {
        AttrSelector::Any(values.iter().map(|v| v.to_string()).collect())
    }
}

/// A partial attribute assignment used to narrow a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    values: BTreeMap<String, AttrSelector>,
}

impl Selection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, builder-style
    pub fn with(mut self, attribute: &str, value: impl Into<AttrSelector>) -> Self {
        self.values.insert(attribute.to_string(), value.into());
        self
    }

    /// Add a constraint in place
    pub fn set(&mut self, attribute: &str, value: impl Into<AttrSelector>) {
        self.values.insert(attribute.to_string(), value.into());
    }

    /// Look up the constraint for an attribute
    pub fn get(&self, attribute: &str) -> Option<&AttrSelector> {
        self.values.get(attribute)
    }

    /// Iterate over all constraints
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrSelector)> {
        self.values.iter()
    }

    /// Whether the selection constrains anything
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fixed context an [`AttributesToPaths`](super::AttributesToPaths) instance
/// is built for: the partial selection, the directory roots for `tag:`
/// prefixes, and the caller's preferred formats.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Construction-time attribute selection (scalar per attribute)
    pub selection: BTreeMap<String, String>,
    /// Directory tag → filesystem root prepended to matching rules' paths
    pub directories: BTreeMap<String, String>,
    /// Formats marked preferred, in priority order
    pub preferred_formats: Vec<String>,
    /// Cancellation token checked during row scans
    pub cancel: CancelToken,
}

impl QueryContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin an attribute for the lifetime of the translator
    pub fn with_selection(mut self, attribute: &str, value: &str) -> Self {
        self.selection
            .insert(attribute.to_string(), value.to_string());
        self
    }

    /// Register the root directory for a `tag:` pattern prefix
    pub fn with_directory(mut self, tag: &str, root: &str) -> Self {
        self.directories.insert(tag.to_string(), root.to_string());
        self
    }

    /// Mark a format as preferred
    pub fn with_preferred_format(mut self, format: &str) -> Self {
        self.preferred_formats.push(format.to_string());
        self
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Options for one directory-matching pass.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Stop trying further sibling patterns at a node once one matches
    pub single_match: bool,
    /// Also yield unmatched entries, with no attributes
    pub all_unknown: bool,
    /// Cancellation token checked once per visited entry
    pub cancel: CancelToken,
}

impl MatchOptions {
    /// Create default options: all matches, unknown entries skipped
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop at the first matching sibling pattern per node
    pub fn with_single_match(mut self, enabled: bool) -> Self {
        self.single_match = enabled;
        self
    }

    /// Yield unmatched entries as unknown
    pub fn with_all_unknown(mut self, enabled: bool) -> Self {
        self.all_unknown = enabled;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_builder() {
        let selection = Selection::new()
            .with("subject", "S1")
            .with("side", vec!["left".to_string(), "right".to_string()]);
        assert_eq!(selection.get("subject").unwrap().as_one(), Some("S1"));
        assert_eq!(selection.get("side").unwrap().values().len(), 2);
        assert!(selection.get("missing").is_none());
    }

    #[test]
    fn test_query_context_builder() {
        let context = QueryContext::new()
            .with_selection("fom_process", "morphology")
            .with_directory("shared", "/data/shared")
            .with_preferred_format("NIFTI");
        assert_eq!(context.selection["fom_process"], "morphology");
        assert_eq!(context.directories["shared"], "/data/shared");
        assert_eq!(context.preferred_formats, ["NIFTI"]);
    }
}
