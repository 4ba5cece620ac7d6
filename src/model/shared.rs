//! Shared pattern macros and their expansion
//!
//! Shared patterns are reusable path fragments referenced via `{name}`
//! tokens, both from other shared patterns and from rule patterns. Before a
//! model is usable every reference must be expanded away; reference cycles
//! are detected up front and rejected.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use serde_json::Value;

use super::attributes::scalar_to_string;
use super::error::{ModelError, ModelResult};

static MACRO_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").unwrap());

/// One expansion alternative of a shared pattern: a path fragment plus the
/// attribute overrides that apply when this alternative is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternVariant {
    pub fragment: String,
    pub overrides: BTreeMap<String, String>,
}

/// A named, reusable path fragment.
///
/// A single-fragment declaration has one variant with no overrides; the list
/// form declares several `(fragment, overrides)` alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPattern {
    pub variants: Vec<PatternVariant>,
}

impl SharedPattern {
    /// Parse a declaration from its document value
    pub(crate) fn from_document(name: &str, value: &Value) -> ModelResult<Self> {
        let malformed = |message: &str| ModelError::MalformedRule {
            context: format!("shared_patterns.{name}"),
            message: message.to_string(),
        };

        match value {
            Value::String(fragment) => Ok(Self {
                variants: vec![PatternVariant {
                    fragment: fragment.clone(),
                    overrides: BTreeMap::new(),
                }],
            }),
            Value::Array(items) => {
                let mut variants = Vec::new();
                for item in items {
                    match item {
                        Value::String(fragment) => variants.push(PatternVariant {
                            fragment: fragment.clone(),
                            overrides: BTreeMap::new(),
                        }),
                        Value::Array(pair) => {
                            let fragment = pair
                                .first()
                                .and_then(Value::as_str)
                                .ok_or_else(|| malformed("variant fragment must be a string"))?;
                            let mut overrides = BTreeMap::new();
                            if let Some(attrs) = pair.get(1) {
                                let obj = attrs
                                    .as_object()
                                    .ok_or_else(|| malformed("variant overrides must be a mapping"))?;
                                for (k, v) in obj {
                                    overrides.insert(
                                        k.clone(),
                                        scalar_to_string(v).ok_or_else(|| {
                                            malformed("override values must be scalars")
                                        })?,
                                    );
                                }
                            }
                            variants.push(PatternVariant {
                                fragment: fragment.to_string(),
                                overrides,
                            });
                        }
                        _ => return Err(malformed("variant must be a string or [fragment, overrides]")),
                    }
                }
                if variants.is_empty() {
                    return Err(malformed("at least one variant is required"));
                }
                Ok(Self { variants })
            }
            _ => Err(malformed("must be a string or a list of variants")),
        }
    }

    /// Whether any variant still contains a `{name}` reference
    fn has_references(&self) -> bool {
        self.variants
            .iter()
            .any(|v| MACRO_REF.is_match(&v.fragment))
    }
}

/// Expand every `{name}` reference in the given pattern set, in place.
///
/// References between shared patterns form a directed graph; a cycle is a
/// fatal definition error (the expansion would never reach a fixpoint).
/// Expansion proceeds in dependency order, so after this call no variant of
/// any pattern contains a reference.
pub(crate) fn expand_all(patterns: &mut BTreeMap<String, SharedPattern>) -> ModelResult<()> {
    // Reference graph: edge from each pattern to the patterns it mentions.
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: BTreeMap<String, NodeIndex> = BTreeMap::new();
    for name in patterns.keys() {
        nodes.insert(name.clone(), graph.add_node(name.clone()));
    }
    for (name, pattern) in patterns.iter() {
        for variant in &pattern.variants {
            for caps in MACRO_REF.captures_iter(&variant.fragment) {
                let referenced = &caps[1];
                let target = nodes.get(referenced).ok_or_else(|| {
                    ModelError::SharedPatternUnknown {
                        name: referenced.to_string(),
                        context: name.clone(),
                    }
                })?;
                graph.add_edge(nodes[name], *target, ());
            }
        }
    }

    let order = petgraph::algo::toposort(&graph, None)
        .map_err(|cycle| ModelError::SharedPatternCycle(graph[cycle.node_id()].clone()))?;

    // Dependencies last in topological order, so expand in reverse.
    for index in order.into_iter().rev() {
        let name = graph[index].clone();
        let pattern = patterns[&name].clone();
        if !pattern.has_references() {
            continue;
        }
        let mut variants = Vec::new();
        for variant in &pattern.variants {
            variants.extend(expand_variant(variant, patterns, &name)?);
        }
        patterns.insert(name, SharedPattern { variants });
    }
    Ok(())
}

/// Expand a piece of pattern text against an already-expanded pattern set,
/// yielding one variant per combination of referenced alternatives.
pub(crate) fn expand_text(
    text: &str,
    patterns: &BTreeMap<String, SharedPattern>,
    context: &str,
) -> ModelResult<Vec<PatternVariant>> {
    expand_variant(
        &PatternVariant {
            fragment: text.to_string(),
            overrides: BTreeMap::new(),
        },
        patterns,
        context,
    )
}

fn expand_variant(
    variant: &PatternVariant,
    patterns: &BTreeMap<String, SharedPattern>,
    context: &str,
) -> ModelResult<Vec<PatternVariant>> {
    let Some(caps) = MACRO_REF.captures(&variant.fragment) else {
        return Ok(vec![variant.clone()]);
    };
    let referenced = &caps[1];
    let pattern = patterns
        .get(referenced)
        .ok_or_else(|| ModelError::SharedPatternUnknown {
            name: referenced.to_string(),
            context: context.to_string(),
        })?;

    let token = caps.get(0).unwrap();
    let mut expanded = Vec::new();
    for alternative in &pattern.variants {
        let mut fragment = String::with_capacity(variant.fragment.len());
        fragment.push_str(&variant.fragment[..token.start()]);
        fragment.push_str(&alternative.fragment);
        fragment.push_str(&variant.fragment[token.end()..]);

        // The referencing pattern's overrides win over the referenced one's.
        let mut overrides = alternative.overrides.clone();
        overrides.extend(variant.overrides.clone());

        expanded.extend(expand_variant(
            &PatternVariant { fragment, overrides },
            patterns,
            context,
        )?);
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pattern_map(entries: &[(&str, Value)]) -> BTreeMap<String, SharedPattern> {
        entries
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    SharedPattern::from_document(name, value).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_expand_nested_references() {
        let mut patterns = pattern_map(&[
            ("acq", json!("<subject>/t1mri/<acquisition>")),
            ("analysis", json!("{acq}/<analysis>")),
        ]);
        expand_all(&mut patterns).unwrap();
        assert_eq!(
            patterns["analysis"].variants[0].fragment,
            "<subject>/t1mri/<acquisition>/<analysis>"
        );
    }

    #[test]
    fn test_expand_variant_list_with_overrides() {
        let mut patterns = pattern_map(&[
            (
                "segmentation",
                json!([
                    ["{acq}/default_analysis/segmentation", {"graph_version": "3.0"}],
                    ["{acq}/old_analysis/segmentation", {"graph_version": "2.0"}]
                ]),
            ),
            ("acq", json!("<subject>/t1mri")),
        ]);
        expand_all(&mut patterns).unwrap();
        let seg = &patterns["segmentation"];
        assert_eq!(seg.variants.len(), 2);
        assert_eq!(
            seg.variants[0].fragment,
            "<subject>/t1mri/default_analysis/segmentation"
        );
        assert_eq!(seg.variants[0].overrides["graph_version"], "3.0");
        assert_eq!(seg.variants[1].overrides["graph_version"], "2.0");
    }

    #[test]
    fn test_reference_cycle_is_fatal() {
        let mut patterns = pattern_map(&[("a", json!("{b}/x")), ("b", json!("{a}/y"))]);
        let err = expand_all(&mut patterns).unwrap_err();
        assert!(matches!(err, ModelError::SharedPatternCycle(_)));
    }

    #[test]
    fn test_self_reference_is_fatal() {
        let mut patterns = pattern_map(&[("a", json!("{a}/x"))]);
        assert!(matches!(
            expand_all(&mut patterns),
            Err(ModelError::SharedPatternCycle(_))
        ));
    }

    #[test]
    fn test_unknown_reference_is_fatal() {
        let mut patterns = pattern_map(&[("a", json!("{missing}/x"))]);
        let err = expand_all(&mut patterns).unwrap_err();
        assert!(
            matches!(err, ModelError::SharedPatternUnknown { name, .. } if name == "missing")
        );
    }

    #[test]
    fn test_expand_text_fan_out() {
        let mut patterns = pattern_map(&[(
            "analysis",
            json!([["default_analysis", {"analysis": "default"}], ["custom", {"analysis": "custom"}]]),
        )]);
        expand_all(&mut patterns).unwrap();
        let variants = expand_text("<subject>/{analysis}/mesh", &patterns, "rule").unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].fragment, "<subject>/default_analysis/mesh");
        assert_eq!(variants[0].overrides["analysis"], "default");
    }
}
