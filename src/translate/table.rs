//! Indexed rule-row store backing attribute→path queries
//!
//! One row per (rule × concrete format). Cells are tri-state per attribute
//! column: a concrete value from the rule's attribute context, or the
//! wildcard marker (`None`) meaning the rule does not constrain that
//! attribute. Per-column equality indexes plus a wildcard row set give
//! average O(1) candidate lookup per attribute; queries intersect candidate
//! sets instead of scanning the table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::FomModel;

/// Name of the format axis in queries and output attribute maps
pub(crate) const FORMAT_ATTRIBUTE: &str = "format";
/// Selector value filtering on the first-format bookkeeping column
pub(crate) const FIRST_FORMAT: &str = "fom_first";
/// Selector value filtering on the preferred-format bookkeeping column
pub(crate) const PREFERRED_FORMAT: &str = "fom_prefered";

#[derive(Debug)]
pub(crate) struct TableRow {
    /// One cell per column; `None` is the wildcard marker
    pub cells: Vec<Option<String>>,
    /// Index of the source rule in the model's flat list
    pub rule: usize,
    /// Concrete format this row stands for
    pub format: Option<String>,
    pub is_first_format: bool,
    pub is_preferred_format: bool,
}

#[derive(Debug)]
pub(crate) struct RuleTable {
    pub columns: Vec<String>,
    column_index: HashMap<String, usize>,
    pub rows: Vec<TableRow>,
    value_index: Vec<HashMap<String, Vec<u32>>>,
    wildcard_index: Vec<Vec<u32>>,
    first_rows: Vec<u32>,
    preferred_rows: Vec<u32>,
}

impl RuleTable {
    /// Build the row store from the rules matching `selection`.
    ///
    /// A rule with several formats inserts one row per format, first format
    /// first; `is_preferred_format` is set on the row whose format appears
    /// in `preferred_formats` (else on the first row), never on more than
    /// one row per rule.
    pub fn build(
        model: &FomModel,
        selection: &BTreeMap<String, String>,
        preferred_formats: &[String],
    ) -> Self {
        let mut columns: Vec<String> = model.attribute_definitions.keys().cloned().collect();
        if !columns.iter().any(|c| c == FORMAT_ATTRIBUTE) {
            columns.push(FORMAT_ATTRIBUTE.to_string());
        }
        let column_index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        let format_column = column_index[FORMAT_ATTRIBUTE];

        let mut table = Self {
            columns,
            column_index,
            rows: Vec::new(),
            value_index: Vec::new(),
            wildcard_index: Vec::new(),
            first_rows: Vec::new(),
            preferred_rows: Vec::new(),
        };

        for (rule_index, rule) in model.selected_rules(selection) {
            let mut base = vec![None; table.columns.len()];
            for (column, cell) in table.columns.iter().zip(base.iter_mut()) {
                *cell = rule.attributes.get(column).cloned();
            }

            if rule.formats.is_empty() {
                table.push_row(TableRow {
                    cells: base,
                    rule: rule_index,
                    format: None,
                    is_first_format: true,
                    is_preferred_format: true,
                });
            } else {
                let preferred = rule
                    .formats
                    .iter()
                    .position(|f| preferred_formats.contains(f))
                    .unwrap_or(0);
                for (i, format) in rule.formats.iter().enumerate() {
                    let mut cells = base.clone();
                    cells[format_column] = Some(format.clone());
                    table.push_row(TableRow {
                        cells,
                        rule: rule_index,
                        format: Some(format.clone()),
                        is_first_format: i == 0,
                        is_preferred_format: i == preferred,
                    });
                }
            }
        }
        table
    }

    fn push_row(&mut self, row: TableRow) {
        let id = self.rows.len() as u32;
        if self.value_index.is_empty() {
            self.value_index = vec![HashMap::new(); self.columns.len()];
            self.wildcard_index = vec![Vec::new(); self.columns.len()];
        }
        for (column, cell) in row.cells.iter().enumerate() {
            match cell {
                Some(value) => self.value_index[column]
                    .entry(value.clone())
                    .or_default()
                    .push(id),
                None => self.wildcard_index[column].push(id),
            }
        }
        if row.is_first_format {
            self.first_rows.push(id);
        }
        if row.is_preferred_format {
            self.preferred_rows.push(id);
        }
        self.rows.push(row);
    }

    /// Column position for an attribute name
    pub fn column(&self, attribute: &str) -> Option<usize> {
        self.column_index.get(attribute).copied()
    }

    /// Row ids whose cell in `column` equals `value`
    pub fn rows_with_value(&self, column: usize, value: &str) -> &[u32] {
        self.value_index
            .get(column)
            .and_then(|index| index.get(value))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Row ids whose cell in `column` is the wildcard marker
    pub fn wildcard_rows(&self, column: usize) -> &[u32] {
        self.wildcard_index
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Row ids flagged as first format
    pub fn first_format_rows(&self) -> &[u32] {
        &self.first_rows
    }

    /// Row ids flagged as preferred format
    pub fn preferred_format_rows(&self) -> &[u32] {
        &self.preferred_rows
    }

    /// All row ids, in insertion order
    pub fn all_rows(&self) -> impl Iterator<Item = u32> {
        0..self.rows.len() as u32
    }

    /// Candidate rows accepting `values` in `column`: equality matches plus
    /// wildcard rows.
    pub fn candidates(&self, column: usize, values: &[String]) -> BTreeSet<u32> {
        let mut set: BTreeSet<u32> = self.wildcard_rows(column).iter().copied().collect();
        for value in values {
            set.extend(self.rows_with_value(column, value).iter().copied());
        }
        set
    }
}
