//! Attributes → paths: indexed rule queries
//!
//! Construction builds the indexed row store for a fixed query context;
//! `find_paths` then answers "which paths would this model produce for these
//! attributes" without scanning the whole table. Construction is the
//! expensive step; a generator is built once per context and reused across
//! queries.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::model::FomModel;

use super::config::{AttrSelector, QueryContext, Selection};
use super::table::{FIRST_FORMAT, FORMAT_ATTRIBUTE, PREFERRED_FORMAT, RuleTable, TableRow};

/// Generates concrete paths from attribute selections.
pub struct AttributesToPaths<'m> {
    model: &'m FomModel,
    context: QueryContext,
    table: RuleTable,
    default_values: BTreeMap<String, String>,
    non_discriminant: BTreeSet<String>,
}

impl<'m> AttributesToPaths<'m> {
    /// Build the indexed row store for the given context
    pub fn new(model: &'m FomModel, context: QueryContext) -> Self {
        let table = RuleTable::build(model, &context.selection, &context.preferred_formats);
        let default_values = model
            .attribute_definitions
            .iter()
            .filter_map(|(name, def)| def.default_value.clone().map(|v| (name.clone(), v)))
            .collect();
        let non_discriminant = model
            .attribute_definitions
            .iter()
            .filter(|(_, def)| !def.discriminant)
            .map(|(name, _)| name.clone())
            .collect();
        debug!(
            "Built path query table: {} rows over {} attributes",
            table.rows.len(),
            table.columns.len()
        );
        Self {
            model,
            context,
            table,
            default_values,
            non_discriminant,
        }
    }

    /// Every attribute the query engine knows about (the format axis
    /// included)
    pub fn all_attributes(&self) -> &[String] {
        &self.table.columns
    }

    /// Paths this model would produce for the given attributes, lazily.
    ///
    /// Caller attributes merge over the construction-time selection. Per
    /// attribute: supplied values keep rows matching one of them or leaving
    /// the attribute unconstrained; an unsupplied attribute with a default
    /// keeps (default or unconstrained) rows and backfills the default into
    /// the output; an unsupplied attribute without a default keeps only
    /// unconstrained rows. Non-discriminant attributes never filter. The
    /// `format` values `fom_first` and `fom_prefered` select on the
    /// bookkeeping flags instead of equality. Rows whose template cannot be
    /// fully substituted are dropped silently.
    pub fn find_paths<'a>(&'a self, attributes: &Selection) -> FindPaths<'a, 'm> {
        let mut merged: BTreeMap<String, AttrSelector> = self
            .context
            .selection
            .iter()
            .map(|(k, v)| (k.clone(), AttrSelector::One(v.clone())))
            .collect();
        for (attribute, selector) in attributes.iter() {
            merged.insert(attribute.clone(), selector.clone());
        }

        let mut defaulted: BTreeSet<String> = BTreeSet::new();
        let mut candidate_sets: Vec<BTreeSet<u32>> = Vec::new();
        for (column, attribute) in self.table.columns.iter().enumerate() {
            if self.non_discriminant.contains(attribute) {
                continue;
            }
            let set: BTreeSet<u32> = match merged.get(attribute) {
                Some(selector) if attribute == FORMAT_ATTRIBUTE => match selector.as_one() {
                    Some(FIRST_FORMAT) => {
                        self.table.first_format_rows().iter().copied().collect()
                    }
                    Some(PREFERRED_FORMAT) => {
                        self.table.preferred_format_rows().iter().copied().collect()
                    }
                    _ => self.table.candidates(column, selector.values()),
                },
                Some(selector) => self.table.candidates(column, selector.values()),
                None => match self.default_values.get(attribute) {
                    Some(default) => {
                        defaulted.insert(attribute.clone());
                        self.table.candidates(column, std::slice::from_ref(default))
                    }
                    None => self.table.wildcard_rows(column).iter().copied().collect(),
                },
            };
            candidate_sets.push(set);
        }

        // Intersect smallest-first; each set already includes the wildcard
        // rows for its attribute.
        candidate_sets.sort_by_key(BTreeSet::len);
        let surviving: Vec<u32> = match candidate_sets.split_first() {
            None => self.table.all_rows().collect(),
            Some((smallest, rest)) => smallest
                .iter()
                .copied()
                .filter(|id| rest.iter().all(|set| set.contains(id)))
                .collect(),
        };

        FindPaths {
            generator: self,
            ids: surviving.into_iter(),
            merged,
            defaulted,
            pending: VecDeque::new(),
        }
    }

    /// Attributes whose value still distinguishes between rules under the
    /// given partial selection: more than one distinct value remains, or
    /// some remaining rule leaves the attribute unconstrained.
    pub fn find_discriminant_attributes(&self, selection: &Selection) -> BTreeSet<String> {
        let mut candidate_sets: Vec<BTreeSet<u32>> = Vec::new();
        for (attribute, selector) in selection.iter() {
            let Some(column) = self.table.column(attribute) else {
                continue;
            };
            let set = if attribute == FORMAT_ATTRIBUTE {
                match selector.as_one() {
                    Some(FIRST_FORMAT) => {
                        self.table.first_format_rows().iter().copied().collect()
                    }
                    Some(PREFERRED_FORMAT) => {
                        self.table.preferred_format_rows().iter().copied().collect()
                    }
                    _ => self.table.candidates(column, selector.values()),
                }
            } else {
                self.table.candidates(column, selector.values())
            };
            candidate_sets.push(set);
        }
        candidate_sets.sort_by_key(BTreeSet::len);
        let rows: Vec<u32> = match candidate_sets.split_first() {
            None => self.table.all_rows().collect(),
            Some((smallest, rest)) => smallest
                .iter()
                .copied()
                .filter(|id| rest.iter().all(|set| set.contains(id)))
                .collect(),
        };

        let mut discriminant = BTreeSet::new();
        for (column, attribute) in self.table.columns.iter().enumerate() {
            if self.non_discriminant.contains(attribute) {
                continue;
            }
            let mut distinct: BTreeSet<&str> = BTreeSet::new();
            let mut wildcard = false;
            for &id in &rows {
                match &self.table.rows[id as usize].cells[column] {
                    Some(value) => {
                        distinct.insert(value.as_str());
                    }
                    None => wildcard = true,
                }
            }
            if distinct.len() > 1 || (wildcard && !rows.is_empty()) {
                discriminant.insert(attribute.clone());
            }
        }
        discriminant
    }

    /// Resolve one surviving row into zero or more `(path, attributes)`
    /// results.
    fn resolve_row(
        &self,
        row: &TableRow,
        merged: &BTreeMap<String, AttrSelector>,
        defaulted: &BTreeSet<String>,
        out: &mut VecDeque<(String, BTreeMap<String, String>)>,
    ) {
        let rule = &self.model.rules()[row.rule];
        let mut attrs = rule.attributes.clone();
        for attribute in defaulted {
            if let Some(default) = self.default_values.get(attribute) {
                attrs.entry(attribute.clone()).or_insert_with(|| default.clone());
            }
        }
        if let Some(format) = &row.format {
            attrs.insert(FORMAT_ATTRIBUTE.to_string(), format.clone());
        }
        for (attribute, selector) in merged {
            // The row's own format is authoritative; the caller's format
            // selector (possibly a fom_first/fom_prefered literal) never
            // lands in the output attributes.
            if attribute == FORMAT_ATTRIBUTE {
                continue;
            }
            if let AttrSelector::One(value) = selector {
                attrs.entry(attribute.clone()).or_insert_with(|| value.clone());
            }
        }

        // Placeholders resolved by a multi-value selector fan out into one
        // path per value; a placeholder with no value at all drops the row.
        let mut fanout: Vec<(String, Vec<String>)> = Vec::new();
        for attribute in rule.template.attributes() {
            if attrs.contains_key(attribute) {
                continue;
            }
            if let Some(AttrSelector::Any(values)) = merged.get(attribute) {
                if !fanout.iter().any(|(a, _)| a == attribute) {
                    fanout.push((attribute.to_string(), values.clone()));
                }
                continue;
            }
            if let Some(default) = self.default_values.get(attribute) {
                attrs.insert(attribute.to_string(), default.clone());
                continue;
            }
            return;
        }

        let mut combinations = vec![attrs];
        for (attribute, values) in &fanout {
            combinations = combinations
                .into_iter()
                .flat_map(|base| {
                    values.iter().map(move |value| {
                        let mut combo = base.clone();
                        combo.insert(attribute.clone(), value.clone());
                        combo
                    })
                })
                .collect();
        }

        for attrs in combinations {
            let Some(mut path) = rule.template.substitute(|a| attrs.get(a).cloned()) else {
                continue;
            };
            if let Some(format) = &row.format {
                if let Some(extension) = self.model.format_extension(format) {
                    if !extension.is_empty() {
                        path.push('.');
                        path.push_str(extension);
                    }
                }
            }
            if let Some(tag) = &rule.directory {
                if let Some(root) = self.context.directories.get(tag) {
                    path = format!("{root}/{path}");
                }
            }
            out.push_back((path, attrs));
        }
    }
}

/// Lazy result sequence of [`AttributesToPaths::find_paths`].
pub struct FindPaths<'a, 'm> {
    generator: &'a AttributesToPaths<'m>,
    ids: std::vec::IntoIter<u32>,
    merged: BTreeMap<String, AttrSelector>,
    defaulted: BTreeSet<String>,
    pending: VecDeque<(String, BTreeMap<String, String>)>,
}

impl Iterator for FindPaths<'_, '_> {
    type Item = (String, BTreeMap<String, String>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.generator.context.cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let id = self.ids.next()?;
            let row = &self.generator.table.rows[id as usize];
            self.generator
                .resolve_row(row, &self.merged, &self.defaulted, &mut self.pending);
        }
    }
}
