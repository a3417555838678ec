//! GROUP BY and aggregate evaluation.

use crate::ast::{AggregateCall, AggregateFunction, ColumnRef, DataType};
use crate::error::QueryError;
use crate::predicate::sort_cmp;
use crate::relation::{Relation, RelationColumn};
use crate::storage::{Row, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    SumInteger(Option<i64>),
    SumFloat(Option<f64>),
    Avg { sum: f64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Accumulator {
    fn new(function: AggregateFunction, data_type: Option<DataType>) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum if data_type == Some(DataType::Integer) => {
                Accumulator::SumInteger(None)
            }
            AggregateFunction::Sum => Accumulator::SumFloat(None),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
        }
    }

    /// Feed one input value; `None` stands for the `*` of `count(*)`.
    fn update(&mut self, value: Option<&Value>) -> Result<(), QueryError> {
        let value = match value {
            None => {
                if let Accumulator::Count(n) = self {
                    *n += 1;
                }
                return Ok(());
            }
            Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::SumInteger(sum) => {
                if let Value::Integer(v) = value {
                    let next = sum.unwrap_or(0).checked_add(*v).ok_or_else(|| {
                        QueryError::Type("integer overflow in sum".to_string())
                    })?;
                    *sum = Some(next);
                }
            }
            Accumulator::SumFloat(sum) => {
                if let Some(v) = value.as_f64() {
                    *sum = Some(sum.unwrap_or(0.0) + v);
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(v) = value.as_f64() {
                    *sum += v;
                    *count += 1;
                }
            }
            Accumulator::Min(best) => keep(best, value, Ordering::Less),
            Accumulator::Max(best) => keep(best, value, Ordering::Greater),
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Integer(n),
            Accumulator::SumInteger(sum) => sum.map_or(Value::Null, Value::Integer),
            Accumulator::SumFloat(sum) => sum.map_or(Value::Null, Value::float),
            Accumulator::Avg { count: 0, .. } => Value::Null,
            Accumulator::Avg { sum, count } => Value::float(sum / count as f64),
            Accumulator::Min(best) | Accumulator::Max(best) => best.unwrap_or(Value::Null),
        }
    }
}

fn keep(best: &mut Option<Value>, value: &Value, wanted: Ordering) {
    let replace = match best {
        Some(current) => sort_cmp(value, current) == wanted,
        None => true,
    };
    if replace {
        *best = Some(value.clone());
    }
}

/// Output type of an aggregate over a column of `input` type.
fn output_type(call: &AggregateCall, input: Option<DataType>) -> Result<DataType, QueryError> {
    let numeric = matches!(input, Some(DataType::Integer | DataType::Float));
    match call.function {
        AggregateFunction::Count => Ok(DataType::Integer),
        AggregateFunction::Sum | AggregateFunction::Avg if !numeric => Err(QueryError::Type(
            format!("{} requires a numeric column", call.label()),
        )),
        AggregateFunction::Avg => Ok(DataType::Float),
        AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max => input
            .ok_or_else(|| QueryError::Parse(format!("{} requires a column", call.label()))),
    }
}

/// Group `input` by `group_columns` and compute `aggregates` per group.
///
/// Groups appear in order of first appearance. Without group columns the
/// whole input forms one group, even when it is empty. The output holds the
/// group columns (labels unchanged) followed by one column per aggregate,
/// labelled with [`AggregateCall::label`].
pub fn group_by(
    input: Relation,
    group_columns: &[ColumnRef],
    aggregates: &[AggregateCall],
) -> Result<Relation, QueryError> {
    let key_indices = group_columns
        .iter()
        .map(|column| input.resolve(column))
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns: Vec<RelationColumn> = key_indices
        .iter()
        .map(|&idx| input.columns[idx].clone())
        .collect();
    let mut arguments = Vec::with_capacity(aggregates.len());
    let mut templates = Vec::with_capacity(aggregates.len());
    for call in aggregates {
        let argument = match &call.argument {
            Some(column) => Some(input.resolve(column)?),
            None => None,
        };
        let input_type = argument.map(|idx| input.columns[idx].data_type);
        columns.push(RelationColumn::new(call.label(), output_type(call, input_type)?));
        arguments.push(argument);
        templates.push(Accumulator::new(call.function, input_type));
    }

    let mut positions: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
    if key_indices.is_empty() {
        positions.insert(Vec::new(), 0);
        groups.push((Vec::new(), templates.clone()));
    }

    let input_rows = input.rows.len();
    for row in &input.rows {
        let key: Vec<Value> = key_indices.iter().map(|&idx| row[idx].clone()).collect();
        let slot = match positions.get(&key) {
            Some(&slot) => slot,
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, templates.clone()));
                groups.len() - 1
            }
        };
        for (acc, argument) in groups[slot].1.iter_mut().zip(&arguments) {
            acc.update(argument.map(|idx| &row[idx]))?;
        }
    }

    let rows: Vec<Row> = groups
        .into_iter()
        .map(|(mut key, accumulators)| {
            key.extend(accumulators.into_iter().map(Accumulator::finish));
            key
        })
        .collect();
    debug!(input_rows, groups = rows.len(), aggregates = aggregates.len(), "group by");
    Ok(Relation { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grades() -> Relation {
        let row = |name: &str, grade: Option<i64>| {
            vec![Value::Text(name.to_string()), grade.map_or(Value::Null, Value::Integer)]
        };
        Relation::new(
            vec![
                RelationColumn::new("s.name", DataType::Text),
                RelationColumn::new("s.grade", DataType::Integer),
            ],
            vec![
                row("Ann", Some(90)),
                row("Bo", Some(70)),
                row("Ann", Some(80)),
                row("Cy", None),
            ],
        )
    }

    fn call(function: AggregateFunction, column: Option<&str>) -> AggregateCall {
        AggregateCall {
            function,
            argument: column.map(ColumnRef::new),
        }
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let out = group_by(
            grades(),
            &[ColumnRef::new("name")],
            &[
                call(AggregateFunction::Count, None),
                call(AggregateFunction::Avg, Some("grade")),
                call(AggregateFunction::Max, Some("grade")),
            ],
        )
        .unwrap();
        assert_eq!(
            out.labels(),
            vec!["s.name", "count(*)", "avg(grade)", "max(grade)"]
        );
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Text("Ann".into()), Value::Integer(2), Value::Float(85.0), Value::Integer(90)],
                vec![Value::Text("Bo".into()), Value::Integer(1), Value::Float(70.0), Value::Integer(70)],
                vec![Value::Text("Cy".into()), Value::Integer(1), Value::Null, Value::Null],
            ]
        );
    }

    #[test]
    fn whole_input_is_one_group() {
        let out = group_by(
            grades(),
            &[],
            &[
                call(AggregateFunction::Count, Some("grade")),
                call(AggregateFunction::Sum, Some("grade")),
                call(AggregateFunction::Min, Some("name")),
            ],
        )
        .unwrap();
        assert_eq!(
            out.rows,
            vec![vec![Value::Integer(3), Value::Integer(240), Value::Text("Ann".into())]]
        );
    }

    #[test]
    fn empty_input_without_groups_yields_nulls() {
        let mut empty = grades();
        empty.rows.clear();
        let out = group_by(
            empty,
            &[],
            &[call(AggregateFunction::Count, None), call(AggregateFunction::Sum, Some("grade"))],
        )
        .unwrap();
        assert_eq!(out.rows, vec![vec![Value::Integer(0), Value::Null]]);
    }

    #[test]
    fn signed_zeros_share_a_group() {
        let input = Relation::new(
            vec![RelationColumn::new("f.x", DataType::Float)],
            vec![vec![Value::Float(0.0)], vec![Value::Float(-0.0)], vec![Value::Float(1.5)]],
        );
        let out = group_by(input, &[ColumnRef::new("x")], &[call(AggregateFunction::Count, None)])
            .unwrap();
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Float(0.0), Value::Integer(2)],
                vec![Value::Float(1.5), Value::Integer(1)],
            ]
        );
    }

    #[test]
    fn sum_of_text_is_a_type_error() {
        assert!(matches!(
            group_by(grades(), &[], &[call(AggregateFunction::Sum, Some("name"))]),
            Err(QueryError::Type(_))
        ));
    }
}
