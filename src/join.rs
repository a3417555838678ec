//! Nested-loop joins over alias-qualified relations.

use crate::ast::{ColumnRef, DataType, JoinCondition, JoinKind};
use crate::error::QueryError;
use crate::predicate::values_equal;
use crate::relation::{lookup, Lookup, Relation, RelationColumn};
use crate::storage::{Row, Value};
use std::collections::HashSet;
use tracing::debug;

/// Join `left` with `right`.
///
/// Output columns are always the left columns followed by the right ones,
/// whatever the join kind. Every ON equality must hold for a pair to match;
/// with no equalities every pair matches. Unmatched rows of the preserved
/// side(s) are padded with NULLs.
pub fn join(
    left: Relation,
    right: Relation,
    kind: JoinKind,
    on: &[JoinCondition],
    left_alias: &str,
    right_alias: &str,
) -> Result<Relation, QueryError> {
    let left_width = left.columns.len();
    let mut columns = left.columns;
    columns.extend(right.columns);
    let keys = bind_conditions(&columns, on, left_alias, right_alias)?;

    let is_match = |l: &Row, r: &Row| -> bool {
        keys.iter().all(|&(a, b)| {
            let cell = |idx: usize| if idx < left_width { &l[idx] } else { &r[idx - left_width] };
            values_equal(cell(a), cell(b))
        })
    };
    let right_width = columns.len() - left_width;

    let rows = match kind {
        JoinKind::Inner => {
            let mut rows = Vec::new();
            for l in &left.rows {
                for r in &right.rows {
                    if is_match(l, r) {
                        rows.push(concat(l, r));
                    }
                }
            }
            rows
        }
        JoinKind::Left => left_outer(&left.rows, &right.rows, right_width, &is_match),
        JoinKind::Right => right_outer(&left.rows, &right.rows, left_width, &is_match),
        JoinKind::Full => {
            let mut rows = left_outer(&left.rows, &right.rows, right_width, &is_match);
            rows.extend(right_outer(&left.rows, &right.rows, left_width, &is_match));
            let mut seen = HashSet::with_capacity(rows.len());
            rows.retain(|row| seen.insert(row.clone()));
            rows
        }
    };
    debug!(
        ?kind,
        left = left_alias,
        right = right_alias,
        left_rows = left.rows.len(),
        right_rows = right.rows.len(),
        output_rows = rows.len(),
        "join"
    );
    Ok(Relation { columns, rows })
}

fn left_outer<F>(left: &[Row], right: &[Row], right_width: usize, is_match: &F) -> Vec<Row>
where
    F: Fn(&Row, &Row) -> bool,
{
    let padding = vec![Value::Null; right_width];
    let mut rows = Vec::with_capacity(left.len());
    for l in left {
        let mut matched = false;
        for r in right {
            if is_match(l, r) {
                matched = true;
                rows.push(concat(l, r));
            }
        }
        if !matched {
            rows.push(concat(l, &padding));
        }
    }
    rows
}

fn right_outer<F>(left: &[Row], right: &[Row], left_width: usize, is_match: &F) -> Vec<Row>
where
    F: Fn(&Row, &Row) -> bool,
{
    let padding = vec![Value::Null; left_width];
    let mut rows = Vec::with_capacity(right.len());
    for r in right {
        let mut matched = false;
        for l in left {
            if is_match(l, r) {
                matched = true;
                rows.push(concat(l, r));
            }
        }
        if !matched {
            rows.push(concat(&padding, r));
        }
    }
    rows
}

fn concat(left: &[Value], right: &[Value]) -> Row {
    let mut row = Vec::with_capacity(left.len() + right.len());
    row.extend_from_slice(left);
    row.extend_from_slice(right);
    row
}

fn bind_conditions(
    columns: &[RelationColumn],
    on: &[JoinCondition],
    left_alias: &str,
    right_alias: &str,
) -> Result<Vec<(usize, usize)>, QueryError> {
    let resolve = |column: &ColumnRef| match lookup(columns, column) {
        Lookup::Found(idx) => Ok(idx),
        Lookup::Ambiguous => Err(QueryError::Schema(format!("ambiguous column {}", column))),
        Lookup::Missing => Err(QueryError::Join(format!(
            "column {} not found in {} or {}",
            column, left_alias, right_alias
        ))),
    };
    on.iter()
        .map(|condition| {
            let a = resolve(&condition.left)?;
            let b = resolve(&condition.right)?;
            let (ta, tb) = (columns[a].data_type, columns[b].data_type);
            let numeric = |t: DataType| matches!(t, DataType::Integer | DataType::Float);
            if ta != tb && !(numeric(ta) && numeric(tb)) {
                return Err(QueryError::Type(format!(
                    "cannot join {} ({}) with {} ({})",
                    condition.left, ta, condition.right, tb
                )));
            }
            Ok((a, b))
        })
        .collect()
}
