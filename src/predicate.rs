//! WHERE and HAVING evaluation.
//!
//! A [`Condition`] is bound once against a column list, coercing its literal
//! to the column type, and the resulting [`Predicate`] is then tested row by
//! row. Binding fails with a type error when the literal cannot be coerced.

use crate::ast::{AggregateCondition, ColumnRef, CompareOp, Condition, DataType};
use crate::error::QueryError;
use crate::relation::{lookup, resolve_column, Lookup, Relation, RelationColumn};
use crate::storage::{Row, Value};
use regex::Regex;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
enum Operand {
    Literal(Value),
    Column(usize),
}

/// A condition bound to column positions.
#[derive(Debug, Clone)]
pub struct Predicate {
    column: usize,
    op: CompareOp,
    operand: Operand,
    pattern: Option<Regex>,
}

impl Predicate {
    pub fn bind(columns: &[RelationColumn], condition: &Condition) -> Result<Self, QueryError> {
        let column = resolve_column(columns, &condition.attribute)?;
        let data_type = columns[column].data_type;

        if condition.op == CompareOp::Like {
            return Ok(Self {
                column,
                op: CompareOp::Like,
                operand: Operand::Literal(Value::Text(condition.value.clone())),
                pattern: Some(like_pattern(&condition.value)?),
            });
        }

        let operand = if condition.quoted {
            Operand::Literal(coerce_operand(&condition.value, data_type)?)
        } else if condition.value.eq_ignore_ascii_case("null") {
            Operand::Literal(Value::Null)
        } else {
            match column_operand(columns, &condition.value)? {
                Some(other) => {
                    let other_type = columns[other].data_type;
                    if !comparable(data_type, other_type) {
                        return Err(QueryError::Type(format!(
                            "cannot compare {} ({}) with {} ({})",
                            condition.attribute, data_type, condition.value, other_type
                        )));
                    }
                    Operand::Column(other)
                }
                None => Operand::Literal(coerce_operand(&condition.value, data_type)?),
            }
        };

        Ok(Self {
            column,
            op: condition.op,
            operand,
            pattern: None,
        })
    }

    pub fn matches(&self, row: &Row) -> bool {
        let left = &row[self.column];
        if left.is_null() {
            return false;
        }
        if let Some(pattern) = &self.pattern {
            return pattern.is_match(&left.to_string());
        }
        let right = match &self.operand {
            Operand::Literal(value) => value,
            Operand::Column(idx) => &row[*idx],
        };
        match compare_values(left, right) {
            Some(ordering) => apply_operator(self.op, ordering),
            None => false,
        }
    }
}

/// Resolve an unquoted literal that names a column in scope.
///
/// Numbers are never column names. Dotted text that is not a number must
/// resolve, since it can only be an alias-qualified column.
fn column_operand(columns: &[RelationColumn], text: &str) -> Result<Option<usize>, QueryError> {
    if text.parse::<f64>().is_ok() {
        return Ok(None);
    }
    let candidate = ColumnRef::parse(text);
    match lookup(columns, &candidate) {
        Lookup::Found(idx) => Ok(Some(idx)),
        Lookup::Ambiguous => Err(QueryError::Schema(format!("ambiguous column {}", text))),
        Lookup::Missing if candidate.qualifier.is_some() => Err(QueryError::unknown_column(text)),
        Lookup::Missing => Ok(None),
    }
}

/// Whether an unquoted condition value would be read as a column reference.
pub fn names_column(columns: &[RelationColumn], condition: &Condition) -> bool {
    !condition.quoted
        && condition.op != CompareOp::Like
        && !condition.value.eq_ignore_ascii_case("null")
        && !matches!(column_operand(columns, &condition.value), Ok(None))
}

fn comparable(left: DataType, right: DataType) -> bool {
    let numeric = |t: DataType| matches!(t, DataType::Integer | DataType::Float);
    left == right || (numeric(left) && numeric(right))
}

/// Coerce a comparison literal to the type of the column it is tested against.
///
/// Numeric columns accept any number, so `grade > 79.5` works on an integer
/// column.
pub fn coerce_operand(text: &str, data_type: DataType) -> Result<Value, QueryError> {
    let trimmed = text.trim();
    let value = match data_type {
        DataType::Text => Some(Value::Text(text.to_string())),
        DataType::Integer | DataType::Float => match trimmed.parse::<i64>() {
            Ok(v) => Some(Value::Integer(v)),
            Err(_) => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .map(Value::Float),
        },
        DataType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
    };
    value.ok_or_else(|| {
        QueryError::Type(format!("cannot compare {} column with '{}'", data_type, text))
    })
}

/// Translate a SQL LIKE pattern into an anchored, case-insensitive regex.
pub fn like_pattern(pattern: &str) -> Result<Regex, QueryError> {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?is)^");
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    regex.push('$');
    Regex::new(&regex).map_err(|err| QueryError::Parse(format!("invalid LIKE pattern: {}", err)))
}

/// Type-aware comparison. `None` when either side is NULL or the types do
/// not compare.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
        (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
    }
}

pub fn values_equal(left: &Value, right: &Value) -> bool {
    compare_values(left, right) == Some(Ordering::Equal)
}

/// Total order used by ORDER BY: NULL first, then numbers, booleans, text.
pub fn sort_cmp(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::Bool(_) => 2,
            Value::Text(_) => 3,
        }
    }
    compare_values(left, right).unwrap_or_else(|| rank(left).cmp(&rank(right)))
}

fn apply_operator(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::LtEq => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::GtEq => ordering != Ordering::Less,
        CompareOp::Like => false,
    }
}

/// Evaluate one condition against a row. Conditions of a clause are ANDed by
/// the caller.
pub fn matches(columns: &[RelationColumn], row: &Row, condition: &Condition) -> Result<bool, QueryError> {
    Ok(Predicate::bind(columns, condition)?.matches(row))
}

/// Keep the rows of `relation` satisfying every condition.
pub fn filter(relation: Relation, conditions: &[Condition]) -> Result<Relation, QueryError> {
    if conditions.is_empty() {
        return Ok(relation);
    }
    let predicates = conditions
        .iter()
        .map(|condition| Predicate::bind(&relation.columns, condition))
        .collect::<Result<Vec<_>, _>>()?;
    let Relation { columns, rows } = relation;
    let rows = rows
        .into_iter()
        .filter(|row| predicates.iter().all(|p| p.matches(row)))
        .collect();
    Ok(Relation { columns, rows })
}

/// Keep the groups whose aggregate values satisfy every HAVING condition.
///
/// `relation` must already carry a column for each aggregate label.
pub fn filter_having(relation: Relation, conditions: &[AggregateCondition]) -> Result<Relation, QueryError> {
    if conditions.is_empty() {
        return Ok(relation);
    }
    let mut bound = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let label = condition.call.label();
        let idx = relation
            .position(&label)
            .ok_or_else(|| QueryError::unknown_column(&label))?;
        bound.push((idx, condition.op, condition.value));
    }
    let Relation { columns, rows } = relation;
    let rows = rows
        .into_iter()
        .filter(|row| {
            bound.iter().all(|&(idx, op, threshold)| match row[idx].as_f64() {
                Some(value) => value
                    .partial_cmp(&threshold)
                    .is_some_and(|ordering| apply_operator(op, ordering)),
                None => false,
            })
        })
        .collect();
    Ok(Relation { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<RelationColumn> {
        vec![
            RelationColumn::new("s.id", DataType::Integer),
            RelationColumn::new("s.name", DataType::Text),
            RelationColumn::new("s.grade", DataType::Float),
            RelationColumn::new("s.active", DataType::Bool),
            RelationColumn::new("e.sid", DataType::Integer),
        ]
    }

    fn row(id: i64, name: &str, grade: Option<f64>, active: bool, sid: i64) -> Row {
        vec![
            Value::Integer(id),
            Value::Text(name.to_string()),
            grade.map_or(Value::Null, Value::Float),
            Value::Bool(active),
            Value::Integer(sid),
        ]
    }

    fn condition(attr: &str, op: CompareOp, value: &str, quoted: bool) -> Condition {
        Condition {
            attribute: ColumnRef::parse(attr),
            op,
            value: value.to_string(),
            quoted,
        }
    }

    #[test]
    fn numeric_comparison_mixes_integer_and_float() {
        let cols = columns();
        let ann = row(1, "Ann", Some(90.0), true, 1);
        assert!(matches(&cols, &ann, &condition("grade", CompareOp::Gt, "80", false)).unwrap());
        assert!(matches(&cols, &ann, &condition("s.id", CompareOp::LtEq, "1.5", false)).unwrap());
        assert!(!matches(&cols, &ann, &condition("id", CompareOp::Eq, "-1", false)).unwrap());
    }

    #[test]
    fn like_is_case_insensitive() {
        let cols = columns();
        let ann = row(1, "Annabel", Some(90.0), true, 1);
        assert!(matches(&cols, &ann, &condition("name", CompareOp::Like, "an%", true)).unwrap());
        assert!(matches(&cols, &ann, &condition("name", CompareOp::Like, "_NNABE_", true)).unwrap());
        assert!(!matches(&cols, &ann, &condition("name", CompareOp::Like, "b%", true)).unwrap());
        assert!(matches(&cols, &ann, &condition("name", CompareOp::Like, "a.*", true)).is_ok());
        assert!(!matches(&cols, &ann, &condition("name", CompareOp::Like, "a.*", true)).unwrap());
    }

    #[test]
    fn null_never_matches() {
        let cols = columns();
        let bo = row(2, "Bo", None, false, 2);
        assert!(!matches(&cols, &bo, &condition("grade", CompareOp::LtEq, "100", false)).unwrap());
        assert!(!matches(&cols, &bo, &condition("name", CompareOp::Eq, "NULL", false)).unwrap());
    }

    #[test]
    fn booleans_order_false_before_true() {
        let cols = columns();
        let bo = row(2, "Bo", None, false, 2);
        assert!(matches(&cols, &bo, &condition("active", CompareOp::Lt, "true", false)).unwrap());
        assert!(matches(&cols, &bo, &condition("active", CompareOp::Eq, "FALSE", false)).unwrap());
    }

    #[test]
    fn unquoted_column_reference_compares_columns() {
        let cols = columns();
        assert!(matches(&cols, &row(3, "Cy", None, true, 3), &condition("s.id", CompareOp::Eq, "e.sid", false)).unwrap());
        assert!(!matches(&cols, &row(3, "Cy", None, true, 4), &condition("s.id", CompareOp::Eq, "e.sid", false)).unwrap());
        assert!(matches!(
            Predicate::bind(&cols, &condition("s.id", CompareOp::Eq, "x.sid", false)),
            Err(QueryError::Schema(_))
        ));
        assert!(matches!(
            Predicate::bind(&cols, &condition("s.name", CompareOp::Eq, "s.id", false)),
            Err(QueryError::Type(_))
        ));
    }

    #[test]
    fn uncoercible_literal_is_a_type_error() {
        let cols = columns();
        assert!(matches!(
            Predicate::bind(&cols, &condition("grade", CompareOp::Gt, "high", true)),
            Err(QueryError::Type(_))
        ));
        assert!(matches!(
            Predicate::bind(&cols, &condition("active", CompareOp::Eq, "maybe", false)),
            Err(QueryError::Type(_))
        ));
    }

    #[test]
    fn sort_order_puts_null_first() {
        let mut values = vec![
            Value::Integer(3),
            Value::Null,
            Value::Float(1.5),
            Value::Integer(2),
        ];
        values.sort_by(sort_cmp);
        assert_eq!(
            values,
            vec![Value::Null, Value::Float(1.5), Value::Integer(2), Value::Integer(3)]
        );
    }
}
