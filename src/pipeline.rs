//! Final stages of a query: ordering, projection and duplicate elimination.

use crate::ast::{DataType, Expr, OrderByExpr, SelectItem};
use crate::error::QueryError;
use crate::predicate::sort_cmp;
use crate::relation::Relation;
use crate::storage::{Row, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Materialized query result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    /// Output labels, as written in the SELECT list.
    pub columns: Vec<String>,
    pub types: Vec<DataType>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row rendered with [`format_value`].
    pub fn to_text_rows(&self) -> Vec<Vec<String>> {
        format_rows(&self.rows)
    }

    /// Values of the column labelled `label`.
    pub fn column(&self, label: &str) -> Option<Vec<&Value>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(label))?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

/// Tab-separated table with a header line, or `No results found.`
impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return f.write_str("No results found.");
        }
        write!(f, "{}", self.columns.join("\t"))?;
        for row in self.to_text_rows() {
            write!(f, "\n{}", row.join("\t"))?;
        }
        Ok(())
    }
}

/// Stable sort on the ORDER BY keys; ties keep their input order.
pub fn order_by(relation: &mut Relation, keys: &[OrderByExpr]) -> Result<(), QueryError> {
    if keys.is_empty() {
        return Ok(());
    }
    let mut bound = Vec::with_capacity(keys.len());
    for key in keys {
        bound.push((expr_index(relation, &key.expr)?, key.asc));
    }
    relation.rows.sort_by(|a, b| {
        for &(idx, asc) in &bound {
            let ordering = sort_cmp(&a[idx], &b[idx]);
            let ordering = if asc { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Project `relation` onto the SELECT list. `*` expands to every column of
/// the relation in order.
pub fn project(relation: Relation, items: &[SelectItem]) -> Result<ResultSet, QueryError> {
    let mut indices = Vec::new();
    let mut columns = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard => {
                for (idx, column) in relation.columns.iter().enumerate() {
                    indices.push(idx);
                    columns.push(column.label.clone());
                }
            }
            SelectItem::Expr(expr) => {
                indices.push(expr_index(&relation, expr)?);
                columns.push(expr.label());
            }
        }
    }
    let types = indices
        .iter()
        .map(|&idx| relation.columns[idx].data_type)
        .collect();
    let rows = relation
        .rows
        .into_iter()
        .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    Ok(ResultSet {
        columns,
        types,
        rows,
    })
}

/// Drop repeated rows; the first occurrence wins.
pub fn distinct(result: &mut ResultSet) {
    let mut seen = HashSet::with_capacity(result.rows.len());
    result.rows.retain(|row| seen.insert(row.clone()));
}

fn expr_index(relation: &Relation, expr: &Expr) -> Result<usize, QueryError> {
    match expr {
        Expr::Column(column) => relation.resolve(column),
        Expr::Aggregate(call) => {
            let label = call.label();
            relation
                .position(&label)
                .ok_or_else(|| QueryError::unknown_column(label))
        }
    }
}

/// Text form used by result output: floats carry three decimals.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => format!("{:.3}", v),
        Value::Text(v) => v.clone(),
        Value::Bool(v) => v.to_string(),
    }
}

pub fn format_rows(rows: &[Row]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect()
}
