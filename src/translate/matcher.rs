//! Path → attributes: compile the pattern tree and walk a directory tree
//!
//! Construction compiles one regex per path segment of every rule in the
//! model's pattern tree; matching then walks a captured [`DirectoryTree`]
//! and recovers the attributes of every recognized file. Compilation is the
//! expensive step; a matcher is built once per context and reused across
//! scans.

use std::collections::{BTreeMap, BTreeSet, VecDeque, btree_map};

use regex::Regex;

use crate::model::{FomModel, PatternTree, SegmentTemplate, TemplateToken};
use crate::tree::{DirEntry, DirectoryTree, FileStat};

use super::config::MatchOptions;
use super::error::{TranslateError, TranslateResult};
use super::table::FORMAT_ATTRIBUTE;

/// One recognized (or, with `all_unknown`, unrecognized) directory entry:
/// path segments from the scan root, the entry's recorded metadata, and the
/// recovered attributes (`None` for unknown entries).
pub type MatchedEntry = (
    Vec<String>,
    Option<FileStat>,
    Option<BTreeMap<String, String>>,
);

#[derive(Debug)]
struct GroupBinding {
    group: String,
    attribute: String,
}

#[derive(Debug)]
struct TerminalRule {
    rule: usize,
    format: Option<String>,
}

#[derive(Debug)]
struct CompiledEdge {
    regex: Regex,
    groups: Vec<GroupBinding>,
    node: CompiledNode,
    /// Extension → rules terminating on this segment
    terminals: BTreeMap<String, Vec<TerminalRule>>,
}

impl CompiledEdge {
    /// Match a segment against this edge, enforcing that attributes already
    /// bound along the path keep their value.
    fn match_segment(
        &self,
        text: &str,
        bound: &BTreeMap<String, String>,
    ) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(text)?;
        let mut result = bound.clone();
        for binding in &self.groups {
            let value = caps.name(&binding.group)?.as_str();
            match result.get(&binding.attribute) {
                Some(existing) if existing != value => return None,
                _ => {
                    result.insert(binding.attribute.clone(), value.to_string());
                }
            }
        }
        Some(result)
    }
}

#[derive(Debug, Default)]
struct CompiledNode {
    children: Vec<CompiledEdge>,
}

/// Recovers semantic attributes from concrete paths.
pub struct PathToAttributes<'m> {
    model: &'m FomModel,
    root: CompiledNode,
}

impl<'m> PathToAttributes<'m> {
    /// Compile the model's pattern tree into per-segment matchers
    pub fn new(model: &'m FomModel) -> TranslateResult<Self> {
        let root = compile_node(model, model.patterns(), &BTreeSet::new())?;
        Ok(Self { model, root })
    }

    /// Walk a directory tree and yield the attributes of every recognized
    /// entry.
    ///
    /// The sequence is lazy and performs a single top-down traversal; it is
    /// consumed by iteration and cannot be restarted. With
    /// `options.all_unknown` set, unrecognized entries (and every descendant
    /// of an unrecognized directory) are yielded with `None` attributes.
    pub fn parse_directory<'a>(
        &'a self,
        tree: &'a DirectoryTree,
        options: MatchOptions,
    ) -> DirectoryMatches<'a> {
        DirectoryMatches {
            model: self.model,
            options,
            pending: VecDeque::new(),
            stack: vec![Frame {
                path: Vec::new(),
                entries: tree.entries(),
                candidates: vec![(&self.root, BTreeMap::new())],
                unknown: false,
            }],
        }
    }
}

fn compile_node(
    model: &FomModel,
    tree: &PatternTree,
    bound: &BTreeSet<String>,
) -> TranslateResult<CompiledNode> {
    let mut children = Vec::new();
    for (raw, subtree) in tree.children() {
        let segment = SegmentTemplate::parse(raw).map_err(|e| TranslateError::BadPattern {
            pattern: raw.clone(),
            message: e.to_string(),
        })?;
        let (regex, groups) = compile_segment(model, &segment, bound)?;

        let mut child_bound = bound.clone();
        child_bound.extend(groups.iter().map(|g| g.attribute.clone()));
        let node = compile_node(model, subtree, &child_bound)?;

        let mut terminals: BTreeMap<String, Vec<TerminalRule>> = BTreeMap::new();
        for &rule_index in subtree.rules() {
            let rule = &model.rules()[rule_index];
            if rule.formats.is_empty() {
                terminals.entry(String::new()).or_default().push(TerminalRule {
                    rule: rule_index,
                    format: None,
                });
            } else {
                for format in &rule.formats {
                    let extension = model.format_extension(format).unwrap_or("");
                    terminals
                        .entry(extension.to_string())
                        .or_default()
                        .push(TerminalRule {
                            rule: rule_index,
                            format: Some(format.clone()),
                        });
                }
            }
        }

        children.push(CompiledEdge {
            regex,
            groups,
            node,
            terminals,
        });
    }
    Ok(CompiledNode { children })
}

/// Compile one segment into an anchored regex.
///
/// A placeholder with a closed, non-open value set that is not yet bound
/// earlier in the rule compiles to an alternation of its literal values;
/// everything else (open attributes, custom `<attr|regex>` sub-patterns,
/// repeated occurrences) compiles to a permissive group. Repeats are
/// enforced by value equality after the match, since the regex engine has
/// no back-references.
fn compile_segment(
    model: &FomModel,
    segment: &SegmentTemplate,
    bound: &BTreeSet<String>,
) -> TranslateResult<(Regex, Vec<GroupBinding>)> {
    let mut pattern = String::from("^");
    let mut groups: Vec<GroupBinding> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for token in segment.tokens() {
        match token {
            TemplateToken::Literal(text) => pattern.push_str(&regex::escape(text)),
            TemplateToken::Placeholder {
                attribute,
                pattern: custom,
            } => {
                let group = format!("g{}", groups.len());
                let already_bound = bound.contains(attribute) || seen.contains(attribute);
                let sub = match custom {
                    Some(custom) => custom.clone(),
                    None => match closed_values(model, attribute) {
                        Some(alternation) if !already_bound => alternation,
                        _ => "[^/]*".to_string(),
                    },
                };
                pattern.push_str(&format!("(?P<{group}>{sub})"));
                groups.push(GroupBinding {
                    group,
                    attribute: attribute.clone(),
                });
                seen.insert(attribute.clone());
            }
        }
    }
    pattern.push('$');
    let regex = Regex::new(&pattern).map_err(|e| TranslateError::BadPattern {
        pattern: segment.raw().to_string(),
        message: e.to_string(),
    })?;
    Ok((regex, groups))
}

fn closed_values(model: &FomModel, attribute: &str) -> Option<String> {
    let def = model.attribute_definitions.get(attribute)?;
    if def.has_declared_values && !def.open_value && !def.values.is_empty() {
        Some(
            def.values
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|"),
        )
    } else {
        None
    }
}

/// Every `(stem, extension)` split of an entry name, one per dot position
/// (earliest dot first, so multi-part extensions like `nii.gz` come before
/// `gz`), ending with the whole name and an empty extension.
fn split_extensions(name: &str) -> Vec<(&str, &str)> {
    let mut splits = Vec::new();
    for (i, _) in name.match_indices('.') {
        splits.push((&name[..i], &name[i + 1..]));
    }
    splits.push((name, ""));
    splits
}

struct Frame<'a> {
    path: Vec<String>,
    entries: btree_map::Iter<'a, String, DirEntry>,
    candidates: Vec<(&'a CompiledNode, BTreeMap<String, String>)>,
    unknown: bool,
}

/// Lazy result sequence of [`PathToAttributes::parse_directory`].
pub struct DirectoryMatches<'a> {
    model: &'a FomModel,
    options: MatchOptions,
    pending: VecDeque<MatchedEntry>,
    stack: Vec<Frame<'a>>,
}

impl<'a> Iterator for DirectoryMatches<'a> {
    type Item = MatchedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.options.cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let frame = self.stack.last_mut()?;
            let Some((name, entry)) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            let mut child_path = frame.path.clone();
            child_path.push(name.clone());
            let unknown = frame.unknown;

            let mut matched = false;
            let mut next_candidates: Vec<(&'a CompiledNode, BTreeMap<String, String>)> = Vec::new();
            if !unknown {
                let splits = split_extensions(name);
                for (node, bound) in &frame.candidates {
                    // Copy the node reference out of the frame borrow so the
                    // edges it yields outlive this stack frame.
                    let node: &'a CompiledNode = *node;
                    'edges: for edge in &node.children {
                        for &(stem, extension) in &splits {
                            let Some(terminals) = edge.terminals.get(extension) else {
                                continue;
                            };
                            let Some(attrs) = edge.match_segment(stem, bound) else {
                                continue;
                            };
                            for terminal in terminals {
                                let rule = &self.model.rules()[terminal.rule];
                                let mut recovered = rule.attributes.clone();
                                recovered
                                    .extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
                                if let Some(format) = &terminal.format {
                                    recovered
                                        .insert(FORMAT_ATTRIBUTE.to_string(), format.clone());
                                }
                                self.pending.push_back((
                                    child_path.clone(),
                                    entry.stat,
                                    Some(recovered),
                                ));
                            }
                            matched = true;
                            if self.options.single_match {
                                break 'edges;
                            }
                        }
                        if entry.children.is_some() && !edge.node.children.is_empty() {
                            if let Some(attrs) = edge.match_segment(name, bound) {
                                next_candidates.push((&edge.node, attrs));
                                matched = true;
                                if self.options.single_match {
                                    break 'edges;
                                }
                            }
                        }
                    }
                }
            }

            if unknown {
                self.pending.push_back((child_path.clone(), entry.stat, None));
                if let Some(children) = &entry.children {
                    self.stack.push(Frame {
                        path: child_path,
                        entries: children.entries(),
                        candidates: Vec::new(),
                        unknown: true,
                    });
                }
                continue;
            }

            if let Some(children) = &entry.children {
                if !next_candidates.is_empty() {
                    self.stack.push(Frame {
                        path: child_path.clone(),
                        entries: children.entries(),
                        candidates: next_candidates,
                        unknown: false,
                    });
                }
            }
            if !matched && self.options.all_unknown {
                self.pending.push_back((child_path.clone(), entry.stat, None));
                if let Some(children) = &entry.children {
                    self.stack.push(Frame {
                        path: child_path,
                        entries: children.entries(),
                        candidates: Vec::new(),
                        unknown: true,
                    });
                }
            }
        }
    }
}
