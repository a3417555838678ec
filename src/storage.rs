use crate::ast::{Condition, DataType};
use crate::error::QueryError;
use crate::predicate::Predicate;
use crate::relation::RelationColumn;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::trace;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

pub type Row = Vec<Value>;

// Floats compare by bit pattern so rows can key hash maps for grouping and
// DISTINCT, with -0.0 folded into 0.0. Ordering comparisons go through
// `predicate::compare_values`.
fn float_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(l), Value::Integer(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => float_bits(*l) == float_bits(*r),
            (Value::Text(l), Value::Text(r)) => l == r,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(v) => v.hash(state),
            Value::Float(v) => float_bits(*v).hash(state),
            Value::Text(v) => v.hash(state),
            Value::Bool(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A float value with `-0.0` folded into `0.0`.
    pub fn float(v: f64) -> Value {
        Value::Float(if v == 0.0 { 0.0 } else { v })
    }

    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert literal text to a value of `data_type`, as stored by INSERT.
    ///
    /// An unquoted `NULL` is NULL for every type. Integer columns accept
    /// integral floats (`3.0`) within the `i64` range, boolean columns accept
    /// `true`/`false`/`1`/`0`. Float `-0.0` is stored as `0.0`.
    pub fn coerce(text: &str, quoted: bool, data_type: DataType) -> Result<Value, StorageError> {
        if !quoted && text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        let trimmed = text.trim();
        let value = match data_type {
            DataType::Text => Some(Value::Text(text.to_string())),
            DataType::Integer => match trimmed.parse::<i64>() {
                Ok(v) => Some(Value::Integer(v)),
                Err(_) => trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| {
                        v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64
                    })
                    .map(|v| Value::Integer(v as i64)),
            },
            DataType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::float),
            DataType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
        };
        value.ok_or_else(|| {
            StorageError::Type(format!("cannot coerce '{}' to {}", text, data_type))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
}

impl TableMeta {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("table not found: {0}")]
    NotFound(String),
    #[error("table already exists: {0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Constraint(String),
}

/// Read-only access the query engine needs from the table store.
///
/// Queries only ever hold `&self`, so one catalog can serve concurrent
/// readers; writers need `&mut` access to the concrete store.
pub trait Catalog {
    /// Look up a table by case-insensitive name.
    fn find_table(&self, name: &str) -> Result<&TableMeta, QueryError>;

    /// Rows of `table`, optionally filtered by `conditions`.
    ///
    /// Conditions use bare column names of `table`. Implementations may
    /// ignore them: callers re-apply the full WHERE clause, so the returned
    /// rows only need to be a superset of the matching ones.
    fn fetch(&self, table: &TableMeta, conditions: &[Condition]) -> Result<Vec<Row>, QueryError>;
}

#[derive(Debug)]
struct TableData {
    meta: TableMeta,
    rows: Vec<Row>,
    key_columns: Vec<usize>,
    keys: HashSet<Vec<Value>>,
}

/// In-memory table store.
#[derive(Debug, Default)]
pub struct StorageEngine {
    tables: HashMap<String, TableData>,
}

impl StorageEngine {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, table: TableMeta) -> Result<(), StorageError> {
        let key = table.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(StorageError::AlreadyExists(table.name));
        }
        let mut key_columns = Vec::with_capacity(table.primary_key.len());
        for column in &table.primary_key {
            let idx = table.column_index(column).ok_or_else(|| {
                StorageError::Invalid(format!("unknown column in primary key: {}", column))
            })?;
            key_columns.push(idx);
        }
        self.tables.insert(
            key,
            TableData {
                meta: table,
                rows: Vec::new(),
                key_columns,
                keys: HashSet::new(),
            },
        );
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(&name.to_lowercase()).map(|t| &t.meta)
    }

    pub fn insert_row(&mut self, table_name: &str, row: Row) -> Result<(), StorageError> {
        self.insert_rows(table_name, vec![row]).map(|_| ())
    }

    /// Append `rows` to a table. Either every row is stored or none is.
    pub fn insert_rows(&mut self, table_name: &str, rows: Vec<Row>) -> Result<usize, StorageError> {
        let table = self
            .tables
            .get_mut(&table_name.to_lowercase())
            .ok_or_else(|| StorageError::NotFound(table_name.to_string()))?;
        let mut new_keys = HashSet::new();
        for row in &rows {
            check_row(&table.meta, row)?;
            if table.key_columns.is_empty() {
                continue;
            }
            let key: Vec<Value> = table.key_columns.iter().map(|&i| row[i].clone()).collect();
            if key.iter().any(Value::is_null) {
                return Err(StorageError::Constraint(format!(
                    "primary key of {} may not be NULL",
                    table.meta.name
                )));
            }
            if table.keys.contains(&key) || !new_keys.insert(key) {
                return Err(StorageError::Constraint(format!(
                    "duplicate primary key in {} ({})",
                    table.meta.name,
                    table.meta.primary_key.join(", ")
                )));
            }
        }
        let count = rows.len();
        table.keys.extend(new_keys);
        table.rows.extend(rows);
        Ok(count)
    }

    pub fn scan_table(&self, table_name: &str) -> Result<&[Row], StorageError> {
        self.tables
            .get(&table_name.to_lowercase())
            .map(|t| t.rows.as_slice())
            .ok_or_else(|| StorageError::NotFound(table_name.to_string()))
    }
}

fn check_row(table: &TableMeta, row: &Row) -> Result<(), StorageError> {
    if row.len() != table.columns.len() {
        return Err(StorageError::Invalid(format!(
            "table {} has {} columns but {} values were supplied",
            table.name,
            table.columns.len(),
            row.len()
        )));
    }
    for (value, column) in row.iter().zip(&table.columns) {
        let fits = match (value, column.data_type) {
            (Value::Null, _) => true,
            (Value::Integer(_), DataType::Integer) => true,
            (Value::Float(_), DataType::Float) => true,
            (Value::Text(_), DataType::Text) => true,
            (Value::Bool(_), DataType::Bool) => true,
            _ => false,
        };
        if !fits {
            return Err(StorageError::Type(format!(
                "value {} does not match column {} of type {}",
                value, column.name, column.data_type
            )));
        }
    }
    Ok(())
}

impl Catalog for StorageEngine {
    fn find_table(&self, name: &str) -> Result<&TableMeta, QueryError> {
        self.get_table(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()).into())
    }

    fn fetch(&self, table: &TableMeta, conditions: &[Condition]) -> Result<Vec<Row>, QueryError> {
        let rows = self.scan_table(&table.name)?;
        if conditions.is_empty() {
            return Ok(rows.to_vec());
        }
        let columns: Vec<RelationColumn> = table
            .columns
            .iter()
            .map(|c| RelationColumn::new(c.name.clone(), c.data_type))
            .collect();
        let predicates = conditions
            .iter()
            .map(|condition| Predicate::bind(&columns, condition))
            .collect::<Result<Vec<_>, _>>()?;
        let fetched: Vec<Row> = rows
            .iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .cloned()
            .collect();
        trace!(
            table = %table.name,
            pushed = conditions.len(),
            scanned = rows.len(),
            fetched = fetched.len(),
            "scan with pushed-down predicates"
        );
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students() -> TableMeta {
        TableMeta {
            name: "students".to_string(),
            columns: vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Text),
            ],
            primary_key: vec!["id".to_string()],
        }
    }

    #[test]
    fn coerce_follows_column_type() {
        assert_eq!(Value::coerce("42", false, DataType::Integer).unwrap(), Value::Integer(42));
        assert_eq!(Value::coerce("3.0", false, DataType::Integer).unwrap(), Value::Integer(3));
        assert!(Value::coerce("3.5", false, DataType::Integer).is_err());
        assert_eq!(Value::coerce("2", false, DataType::Float).unwrap(), Value::Float(2.0));
        assert_eq!(Value::coerce("TRUE", false, DataType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(Value::coerce("null", false, DataType::Text).unwrap(), Value::Null);
        assert_eq!(
            Value::coerce("null", true, DataType::Text).unwrap(),
            Value::Text("null".to_string())
        );
        assert!(Value::coerce("abc", true, DataType::Float).is_err());
    }

    #[test]
    fn integer_coercion_rejects_out_of_range_literals() {
        assert!(matches!(
            Value::coerce("99999999999999999999", false, DataType::Integer),
            Err(StorageError::Type(_))
        ));
        assert!(Value::coerce("9223372036854775807.0", false, DataType::Integer).is_err());
        assert_eq!(
            Value::coerce("-9223372036854775808", false, DataType::Integer).unwrap(),
            Value::Integer(i64::MIN)
        );
        assert_eq!(
            Value::coerce("-4.0", false, DataType::Integer).unwrap(),
            Value::Integer(-4)
        );
    }

    #[test]
    fn negative_zero_is_the_same_value_as_zero() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |value: &Value| {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(hash(&Value::Float(-0.0)), hash(&Value::Float(0.0)));
        match Value::coerce("-0.0", false, DataType::Float).unwrap() {
            Value::Float(v) => assert!(v.is_sign_positive()),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn primary_key_is_enforced() {
        let mut storage = StorageEngine::new_in_memory();
        storage.create_table(students()).unwrap();
        storage
            .insert_row("students", vec![Value::Integer(1), Value::Text("Ann".into())])
            .unwrap();
        let err = storage
            .insert_row("STUDENTS", vec![Value::Integer(1), Value::Text("Bo".into())])
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
        let err = storage
            .insert_row("students", vec![Value::Null, Value::Text("Cy".into())])
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
        assert_eq!(storage.scan_table("students").unwrap().len(), 1);
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let mut storage = StorageEngine::new_in_memory();
        storage.create_table(students()).unwrap();
        let batch = vec![
            vec![Value::Integer(1), Value::Text("Ann".into())],
            vec![Value::Integer(2), Value::Text("Bo".into())],
            vec![Value::Integer(1), Value::Text("Cy".into())],
        ];
        assert!(matches!(
            storage.insert_rows("students", batch),
            Err(StorageError::Constraint(_))
        ));
        assert!(storage.scan_table("students").unwrap().is_empty());
        let err = storage
            .insert_rows("students", vec![vec![Value::Text("x".into()), Value::Null]])
            .unwrap_err();
        assert!(matches!(err, StorageError::Type(_)));
    }

    #[test]
    fn duplicate_table_and_bad_key_are_rejected() {
        let mut storage = StorageEngine::new_in_memory();
        storage.create_table(students()).unwrap();
        assert!(matches!(
            storage.create_table(students()),
            Err(StorageError::AlreadyExists(_))
        ));
        let mut bad = students();
        bad.name = "other".to_string();
        bad.primary_key = vec!["missing".to_string()];
        assert!(matches!(storage.create_table(bad), Err(StorageError::Invalid(_))));
    }

    #[test]
    fn fetch_applies_pushed_down_conditions() {
        let mut storage = StorageEngine::new_in_memory();
        storage.create_table(students()).unwrap();
        for (id, name) in [(1, "Ann"), (2, "Bo"), (3, "Cy")] {
            storage
                .insert_row("students", vec![Value::Integer(id), Value::Text(name.into())])
                .unwrap();
        }
        let table = storage.find_table("Students").unwrap().clone();
        let condition = Condition {
            attribute: crate::ast::ColumnRef::new("id"),
            op: crate::ast::CompareOp::GtEq,
            value: "2".to_string(),
            quoted: false,
        };
        let rows = storage.fetch(&table, &[condition]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(storage.fetch(&table, &[]).unwrap().len(), 3);
        assert!(matches!(
            storage.find_table("nope"),
            Err(QueryError::Schema(_))
        ));
    }
}
