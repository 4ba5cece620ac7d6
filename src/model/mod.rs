//! The normalized rule store
//!
//! A [`FomModel`] aggregates one or more file organization documents into a
//! single queryable structure:
//! - merged attribute definitions, formats and format lists
//! - fully expanded shared patterns
//! - the flat ordered rule list (attribute→path queries)
//! - the segment-depth pattern tree (path→attribute matching)
//!
//! A model is built once per configuration and treated as immutable
//! afterwards; both translators borrow it read-only.

mod attributes;
mod error;
mod import;
mod rules;
mod shared;
mod template;

use std::collections::BTreeMap;

pub use attributes::AttributeDefinition;
pub use error::{ModelError, ModelResult};
pub use rules::{PatternTree, Rule};
pub use shared::{PatternVariant, SharedPattern};
pub use template::{PathTemplate, SegmentTemplate, TemplateToken};

/// Aggregated, normalized file organization model.
#[derive(Debug, Clone, Default)]
pub struct FomModel {
    /// Identifiers of imported documents; import is idempotent per name
    pub fom_names: Vec<String>,
    /// Merged attribute schema
    pub attribute_definitions: BTreeMap<String, AttributeDefinition>,
    /// Format name → file extension (no leading dot, possibly empty)
    pub formats: BTreeMap<String, String>,
    /// Format list name → ordered format names; the first entry is the
    /// "first" format
    pub format_lists: BTreeMap<String, Vec<String>>,
    /// Fully expanded shared patterns
    pub shared_patterns: BTreeMap<String, SharedPattern>,
    patterns: PatternTree,
    rules: Vec<Rule>,
}

impl FomModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// The flat rule list, in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The segment-depth pattern tree
    pub fn patterns(&self) -> &PatternTree {
        &self.patterns
    }

    /// File extension for a format name
    pub fn format_extension(&self, format: &str) -> Option<&str> {
        self.formats.get(format).map(String::as_str)
    }

    /// Rules matching a partial attribute selection, with their indexes in
    /// the flat list.
    ///
    /// Every selection key must match the rule's attributes exactly, except
    /// `format`: the selector `fom_first` keeps rules without declared
    /// formats, `fom_prefered` is resolved by the query engine and passes
    /// through here, and a concrete format name keeps rules accepting it.
    pub fn selected_rules<'a>(
        &'a self,
        selection: &'a BTreeMap<String, String>,
    ) -> impl Iterator<Item = (usize, &'a Rule)> + 'a {
        self.rules.iter().enumerate().filter(move |(_, rule)| {
            selection.iter().all(|(key, value)| {
                if key == "format" {
                    match value.as_str() {
                        "fom_first" => rule.formats.is_empty(),
                        "fom_prefered" => true,
                        name => rule.formats.iter().any(|f| f == name),
                    }
                } else {
                    rule.attributes.get(key).is_some_and(|v| v == value)
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_rule_model() -> FomModel {
        let mut model = FomModel::new();
        model
            .import_value(
                &json!({
                    "fom_name": "test",
                    "formats": {"NIFTI": "nii", "GIS": "ima"},
                    "format_lists": {"images": ["NIFTI", "GIS"]},
                    "patterns": {
                        "raw": [["data/<subject>/raw", "images"]],
                        "seg": [["data/<subject>/seg", null, {"step": "segmentation"}]]
                    }
                }),
                None,
            )
            .unwrap();
        model
    }

    #[test]
    fn test_selected_rules_exact_match() {
        let model = two_rule_model();
        let selection = BTreeMap::from([("step".to_string(), "segmentation".to_string())]);
        let selected: Vec<_> = model.selected_rules(&selection).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].1.template.to_string(), "data/<subject>/seg");
    }

    #[test]
    fn test_selected_rules_missing_key_excludes() {
        let model = two_rule_model();
        let selection = BTreeMap::from([("step".to_string(), "other".to_string())]);
        assert_eq!(model.selected_rules(&selection).count(), 0);
    }

    #[test]
    fn test_selected_rules_fom_first_keeps_formatless() {
        let model = two_rule_model();
        let selection = BTreeMap::from([("format".to_string(), "fom_first".to_string())]);
        let selected: Vec<_> = model.selected_rules(&selection).collect();
        assert_eq!(selected.len(), 1);
        assert!(selected[0].1.formats.is_empty());
    }

    #[test]
    fn test_selected_rules_concrete_format() {
        let model = two_rule_model();
        let selection = BTreeMap::from([("format".to_string(), "GIS".to_string())]);
        let selected: Vec<_> = model.selected_rules(&selection).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, 0);
    }
}
