//! Intermediate row sets flowing between pipeline stages.
//!
//! A [`Relation`] pairs positional rows with the labels of their columns.
//! Scans produce alias-qualified labels (`s.grade`); grouping produces the
//! group-by labels followed by aggregate labels (`count(*)`).

use crate::ast::{ColumnRef, DataType};
use crate::error::QueryError;
use crate::storage::{Row, TableMeta};

#[derive(Debug, Clone, PartialEq)]
pub struct RelationColumn {
    pub label: String,
    pub data_type: DataType,
}

impl RelationColumn {
    pub fn new(label: impl Into<String>, data_type: DataType) -> Self {
        Self {
            label: label.into(),
            data_type,
        }
    }

    fn qualifier_and_name(&self) -> (Option<&str>, &str) {
        match self.label.split_once('.') {
            Some((qualifier, name)) => (Some(qualifier), name),
            None => (None, self.label.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relation {
    pub columns: Vec<RelationColumn>,
    pub rows: Vec<Row>,
}

/// Outcome of resolving a column reference against a column list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(usize),
    Missing,
    Ambiguous,
}

impl Relation {
    pub fn new(columns: Vec<RelationColumn>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Wrap scanned rows of `table`, labelling each column `alias.column`.
    pub fn from_table(alias: &str, table: &TableMeta, rows: Vec<Row>) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|c| RelationColumn::new(format!("{}.{}", alias, c.name), c.data_type))
            .collect();
        Self { columns, rows }
    }

    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    pub fn resolve(&self, column: &ColumnRef) -> Result<usize, QueryError> {
        resolve_column(&self.columns, column)
    }

    /// Index of the column whose label is exactly `label`.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.label.eq_ignore_ascii_case(label))
    }
}

/// Find `column` among `columns`.
///
/// A qualified reference matches `qualifier.name`. An unqualified one first
/// matches a whole label (grouped output), then the name part of qualified
/// labels, where more than one hit is ambiguous.
pub fn lookup(columns: &[RelationColumn], column: &ColumnRef) -> Lookup {
    if let Some(qualifier) = &column.qualifier {
        let found = columns.iter().position(|c| {
            let (q, n) = c.qualifier_and_name();
            q.is_some_and(|q| q.eq_ignore_ascii_case(qualifier))
                && n.eq_ignore_ascii_case(&column.name)
        });
        return found.map_or(Lookup::Missing, Lookup::Found);
    }
    if let Some(idx) = columns
        .iter()
        .position(|c| c.label.eq_ignore_ascii_case(&column.name))
    {
        return Lookup::Found(idx);
    }
    let mut hits = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.qualifier_and_name().1.eq_ignore_ascii_case(&column.name))
        .map(|(idx, _)| idx);
    match (hits.next(), hits.next()) {
        (Some(idx), None) => Lookup::Found(idx),
        (Some(_), Some(_)) => Lookup::Ambiguous,
        (None, _) => Lookup::Missing,
    }
}

pub fn resolve_column(columns: &[RelationColumn], column: &ColumnRef) -> Result<usize, QueryError> {
    match lookup(columns, column) {
        Lookup::Found(idx) => Ok(idx),
        Lookup::Missing => Err(QueryError::unknown_column(column)),
        Lookup::Ambiguous => Err(QueryError::Schema(format!(
            "ambiguous column {}",
            column
        ))),
    }
}
