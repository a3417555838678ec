use crate::aggregate::group_by;
use crate::ast::{ColumnRef, Condition, CreateTable, DataType, Insert, JoinKind, Literal, Query, Statement};
use crate::join::join;
use crate::parser;
use crate::pipeline::{self, ResultSet};
use crate::predicate::{self, names_column, Predicate};
use crate::relation::{lookup, resolve_column, Lookup, Relation, RelationColumn};
use crate::storage::{Catalog, Column, Row, StorageEngine, TableMeta, Value};
use async_trait::async_trait;
use sqllogictest::{DBOutput, DefaultColumnType};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

pub use crate::error::QueryError;

/// Knobs of query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Hand WHERE conditions on the first FROM table to the scan.
    pub predicate_pushdown: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            predicate_pushdown: true,
        }
    }
}

/// A table bound to the name it is addressed by within one query.
#[derive(Debug, Clone, Copy)]
pub struct ScopedTable<'a> {
    pub alias: &'a str,
    pub meta: &'a TableMeta,
}

/// Alias map of one query, in FROM/JOIN order.
#[derive(Debug, Default)]
pub struct QueryScope<'a> {
    tables: Vec<ScopedTable<'a>>,
}

impl<'a> QueryScope<'a> {
    pub fn bind(catalog: &'a dyn Catalog, query: &'a Query) -> Result<Self, QueryError> {
        let mut tables: Vec<ScopedTable<'a>> = Vec::new();
        for table in query.tables() {
            let alias = table.scope_name();
            if tables.iter().any(|t| t.alias.eq_ignore_ascii_case(alias)) {
                return Err(QueryError::Schema(format!(
                    "table alias {} is used more than once",
                    alias
                )));
            }
            tables.push(ScopedTable {
                alias,
                meta: catalog.find_table(&table.name)?,
            });
        }
        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[ScopedTable<'a>] {
        &self.tables
    }

    /// Every column in scope, labelled `alias.column`.
    pub fn columns(&self) -> Vec<RelationColumn> {
        self.tables
            .iter()
            .flat_map(|t| {
                t.meta
                    .columns
                    .iter()
                    .map(move |c| RelationColumn::new(format!("{}.{}", t.alias, c.name), c.data_type))
            })
            .collect()
    }
}

/// Evaluate a parsed SELECT against `catalog`.
///
/// Stages run in a fixed order: scan and join, WHERE, grouping and HAVING,
/// ORDER BY, projection, DISTINCT. WHERE conditions on the first table may
/// also be handed to its scan; they are re-applied after the joins either way.
pub fn execute_query(
    catalog: &dyn Catalog,
    query: &Query,
    options: &EngineOptions,
) -> Result<ResultSet, QueryError> {
    let scope = QueryScope::bind(catalog, query)?;
    let [first, rest @ ..] = scope.tables() else {
        return Err(QueryError::Parse("FROM clause names no table".to_string()));
    };

    // Reject bad references before any rows are read.
    let scope_columns = scope.columns();
    for condition in &query.selection {
        Predicate::bind(&scope_columns, condition)?;
    }
    for column in &query.group_by {
        resolve_column(&scope_columns, column)?;
    }

    let pushed = if options.predicate_pushdown {
        pushdown_conditions(query, &scope_columns, first)
    } else {
        Vec::new()
    };
    let rows = catalog.fetch(first.meta, &pushed)?;
    debug!(table = %first.meta.name, alias = first.alias, pushed = pushed.len(), rows = rows.len(), "scan");
    let mut relation = Relation::from_table(first.alias, first.meta, rows);

    let comma_tables = query.from.len().saturating_sub(1);
    let mut left_alias = first.alias.to_string();
    for (idx, table) in rest.iter().enumerate() {
        let rows = catalog.fetch(table.meta, &[])?;
        debug!(table = %table.meta.name, alias = table.alias, rows = rows.len(), "scan");
        let right = Relation::from_table(table.alias, table.meta, rows);
        relation = if idx < comma_tables {
            join(relation, right, JoinKind::Inner, &[], &left_alias, table.alias)?
        } else {
            let link = &query.joins[idx - comma_tables];
            join(relation, right, link.kind, &link.on, &left_alias, table.alias)?
        };
        left_alias = format!("{},{}", left_alias, table.alias);
    }

    relation = predicate::filter(relation, &query.selection)?;
    debug!(rows = relation.rows.len(), conditions = query.selection.len(), "where");

    if query.is_aggregate() {
        relation = group_by(relation, &query.group_by, &query.aggregates())?;
        relation = predicate::filter_having(relation, &query.having)?;
        debug!(groups = relation.rows.len(), "group by / having");
    }

    pipeline::order_by(&mut relation, &query.order_by)?;
    let mut result = pipeline::project(relation, &query.projection)?;
    if query.distinct {
        pipeline::distinct(&mut result);
    }
    debug!(rows = result.len(), columns = result.columns.len(), "result");
    Ok(result)
}

/// WHERE conditions that only involve the first table, rewritten to its bare
/// column names.
fn pushdown_conditions(
    query: &Query,
    scope_columns: &[RelationColumn],
    first: &ScopedTable<'_>,
) -> Vec<Condition> {
    let width = first.meta.columns.len();
    let mut pushed = Vec::new();
    for condition in &query.selection {
        let idx = match lookup(scope_columns, &condition.attribute) {
            Lookup::Found(idx) if idx < width => idx,
            _ => continue,
        };
        if names_column(scope_columns, condition) {
            trace!(attribute = %condition.attribute, value = %condition.value, "not pushed: column operand");
            continue;
        }
        trace!(attribute = %condition.attribute, op = %condition.op, table = first.alias, "pushed down");
        pushed.push(Condition {
            attribute: ColumnRef::new(first.meta.columns[idx].name.clone()),
            ..condition.clone()
        });
    }
    pushed
}

/// Result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutput {
    Created,
    Inserted(usize),
    Rows(ResultSet),
}

/// An in-memory database: a table store plus execution options.
#[derive(Debug, Default)]
pub struct Database {
    storage: StorageEngine,
    options: EngineOptions,
}

impl Database {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            storage: StorageEngine::new_in_memory(),
            options,
        }
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Hand the table store over, e.g. to share it between reader threads.
    pub fn into_storage(self) -> StorageEngine {
        self.storage
    }

    pub fn execute(&mut self, sql: &str) -> Result<StatementOutput, QueryError> {
        self.execute_inner(sql).inspect_err(|err| {
            warn!(%err, sql, "statement rejected");
        })
    }

    fn execute_inner(&mut self, sql: &str) -> Result<StatementOutput, QueryError> {
        match parser::parse_statement(sql)? {
            Statement::CreateTable(create) => {
                let meta = build_table_meta(create)?;
                debug!(table = %meta.name, columns = meta.columns.len(), "create table");
                self.storage.create_table(meta)?;
                Ok(StatementOutput::Created)
            }
            Statement::Insert(insert) => {
                let count = self.insert(insert)?;
                Ok(StatementOutput::Inserted(count))
            }
            Statement::Select(query) => Ok(StatementOutput::Rows(execute_query(
                &self.storage,
                &query,
                &self.options,
            )?)),
        }
    }

    /// Run a SELECT without requiring mutable access.
    pub fn query(&self, sql: &str) -> Result<ResultSet, QueryError> {
        let query = parser::parse_select(sql).inspect_err(|err| {
            warn!(%err, sql, "query rejected");
        })?;
        execute_query(&self.storage, &query, &self.options).inspect_err(|err| {
            warn!(%err, sql, "query rejected");
        })
    }

    pub fn run_statement(&mut self, sql: &str) -> Result<DBOutput<DefaultColumnType>, QueryError> {
        match self.execute(sql)? {
            StatementOutput::Created => Ok(DBOutput::StatementComplete(0)),
            StatementOutput::Inserted(count) => Ok(DBOutput::StatementComplete(count as u64)),
            StatementOutput::Rows(result) => {
                let types = result
                    .types
                    .iter()
                    .map(|data_type| match data_type {
                        DataType::Integer => DefaultColumnType::Integer,
                        DataType::Float => DefaultColumnType::FloatingPoint,
                        DataType::Text | DataType::Bool => {
                            DefaultColumnType::Text
                        }
                    })
                    .collect();
                Ok(DBOutput::Rows {
                    types,
                    rows: result.to_text_rows(),
                })
            }
        }
    }

    fn insert(&mut self, insert: Insert) -> Result<usize, QueryError> {
        let table = self.storage.find_table(&insert.table)?.clone();
        let rows = insert
            .rows
            .iter()
            .map(|values| build_insert_row(&table, &insert.columns, values))
            .collect::<Result<Vec<_>, _>>()?;
        let count = self.storage.insert_rows(&table.name, rows)?;
        debug!(table = %table.name, rows = count, "insert");
        Ok(count)
    }
}

#[async_trait]
impl sqllogictest::AsyncDB for Database {
    type Error = QueryError;
    type ColumnType = DefaultColumnType;

    async fn run(&mut self, sql: &str) -> Result<DBOutput<Self::ColumnType>, Self::Error> {
        self.run_statement(sql)
    }

    fn engine_name(&self) -> &str {
        "seldb"
    }
}

fn build_table_meta(create: CreateTable) -> Result<TableMeta, QueryError> {
    if create.columns.is_empty() {
        return Err(QueryError::Schema("table must have at least one column".to_string()));
    }
    let mut column_names = HashSet::new();
    for column in &create.columns {
        if !column_names.insert(column.name.to_lowercase()) {
            return Err(QueryError::Schema(format!(
                "duplicate column name: {}",
                column.name
            )));
        }
    }
    let mut key_names = HashSet::new();
    for key in &create.primary_key {
        if !column_names.contains(&key.to_lowercase()) {
            return Err(QueryError::Schema(format!(
                "unknown column in primary key: {}",
                key
            )));
        }
        if !key_names.insert(key.to_lowercase()) {
            return Err(QueryError::Schema(format!(
                "column {} appears twice in primary key",
                key
            )));
        }
    }
    Ok(TableMeta {
        name: create.name,
        columns: create
            .columns
            .into_iter()
            .map(|def| Column::new(def.name, def.data_type))
            .collect(),
        primary_key: create.primary_key,
    })
}

fn build_insert_row(table: &TableMeta, columns: &[String], values: &[Literal]) -> Result<Row, QueryError> {
    let mut row = vec![Value::Null; table.columns.len()];
    if columns.is_empty() {
        if values.len() != table.columns.len() {
            return Err(QueryError::Schema(format!(
                "table {} has {} columns but {} values were supplied",
                table.name,
                table.columns.len(),
                values.len()
            )));
        }
        for (idx, literal) in values.iter().enumerate() {
            row[idx] = literal_value(literal, &table.columns[idx])?;
        }
        return Ok(row);
    }
    if values.len() != columns.len() {
        return Err(QueryError::Schema(format!(
            "{} columns but {} values were supplied",
            columns.len(),
            values.len()
        )));
    }
    let mut assigned = HashSet::new();
    for (name, literal) in columns.iter().zip(values) {
        let idx = table
            .column_index(name)
            .ok_or_else(|| QueryError::unknown_column(name))?;
        if !assigned.insert(idx) {
            return Err(QueryError::Schema(format!("column {} assigned twice", name)));
        }
        row[idx] = literal_value(literal, &table.columns[idx])?;
    }
    Ok(row)
}

fn literal_value(literal: &Literal, column: &Column) -> Result<Value, QueryError> {
    let coerced = match literal {
        Literal::Null => return Ok(Value::Null),
        Literal::Word(text) if column.data_type == DataType::Text => {
            return Err(QueryError::Type(format!(
                "column {}: text value {} must be quoted",
                column.name, text
            )))
        }
        Literal::Number(text) | Literal::Word(text) => Value::coerce(text, false, column.data_type),
        Literal::String(text) => Value::coerce(text, true, column.data_type),
    };
    coerced.map_err(|err| QueryError::Type(format!("column {}: {}", column.name, err)))
}
