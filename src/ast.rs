//! AST nodes for seldb's command parser.
//!
//! These types are stable, data-only representations of parsed commands. They
//! are produced by `parser::parse_statement` / `parser::parse_select` and
//! consumed by the engine, which never mutates them.
//!
//! # Examples
//! ```no_run
//! use seldb::ast::{ColumnRef, SelectItem, Expr};
//! use seldb::parser::parse_select;
//!
//! let query = parse_select("SELECT name FROM students WHERE grade > 80").unwrap();
//! assert_eq!(
//!     query.projection,
//!     vec![SelectItem::Expr(Expr::Column(ColumnRef::new("name")))]
//! );
//! assert_eq!(query.selection.len(), 1);
//! ```

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
/// Top-level command variants.
pub enum Statement {
    /// CREATE TABLE statement.
    CreateTable(CreateTable),
    /// INSERT statement.
    Insert(Insert),
    /// SELECT statement.
    Select(Query),
}

#[derive(Debug, Clone, PartialEq)]
/// CREATE TABLE statement.
pub struct CreateTable {
    /// Table name.
    pub name: String,
    /// Column definitions in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Primary key columns, from column or table constraints.
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Column definition within CREATE TABLE.
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
/// INSERT statement.
pub struct Insert {
    /// Target table name.
    pub table: String,
    /// Target columns list; empty means every column in order.
    pub columns: Vec<String>,
    /// One entry per VALUES tuple.
    pub rows: Vec<Vec<Literal>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Column types understood by the catalog.
pub enum DataType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    Text,
    /// Boolean.
    Bool,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Text => "TEXT",
            DataType::Bool => "BOOL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Literal as written in an INSERT tuple.
pub enum Literal {
    /// NULL literal.
    Null,
    /// Numeric token, kept verbatim (sign included) until coerced.
    Number(String),
    /// Single-quoted string.
    String(String),
    /// Bare word such as TRUE or FALSE.
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
/// Parsed SELECT command.
pub struct Query {
    /// Whether DISTINCT was specified.
    pub distinct: bool,
    /// Projection list.
    pub projection: Vec<SelectItem>,
    /// Source tables; the first one is the left side of any join chain.
    pub from: Vec<TableRef>,
    /// Join chain, applied left to right after `from[0]`.
    pub joins: Vec<Join>,
    /// WHERE conditions, implicitly ANDed.
    pub selection: Vec<Condition>,
    /// GROUP BY columns.
    pub group_by: Vec<ColumnRef>,
    /// HAVING conditions, implicitly ANDed.
    pub having: Vec<AggregateCondition>,
    /// ORDER BY keys.
    pub order_by: Vec<OrderByExpr>,
}

impl Query {
    /// Every table reference of the query in declaration order, joined
    /// tables included.
    pub fn tables(&self) -> impl Iterator<Item = &TableRef> {
        self.from
            .iter()
            .chain(self.joins.iter().map(|join| &join.table))
    }

    /// Aggregate calls referenced anywhere in the query, deduplicated by label.
    pub fn aggregates(&self) -> Vec<AggregateCall> {
        let mut calls: Vec<AggregateCall> = Vec::new();
        let projected = self.projection.iter().filter_map(|item| match item {
            SelectItem::Expr(Expr::Aggregate(call)) => Some(call),
            _ => None,
        });
        let having = self.having.iter().map(|cond| &cond.call);
        let ordered = self.order_by.iter().filter_map(|order| match &order.expr {
            Expr::Aggregate(call) => Some(call),
            _ => None,
        });
        for call in projected.chain(having).chain(ordered) {
            if !calls.iter().any(|c| c.label() == call.label()) {
                calls.push(call.clone());
            }
        }
        calls
    }

    /// Whether the query needs the aggregation stage.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Item in SELECT projection.
pub enum SelectItem {
    /// Wildcard projection (`*`).
    Wildcard,
    /// Column or aggregate.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
/// Expression usable in projections and ORDER BY.
pub enum Expr {
    /// Plain or alias-qualified column.
    Column(ColumnRef),
    /// Aggregate function call.
    Aggregate(AggregateCall),
}

impl Expr {
    /// Output label for the expression.
    pub fn label(&self) -> String {
        match self {
            Expr::Column(column) => column.to_string(),
            Expr::Aggregate(call) => call.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Column reference, optionally qualified by a table alias.
pub struct ColumnRef {
    /// Alias or table name before the dot.
    pub qualifier: Option<String>,
    /// Column name.
    pub name: String,
}

impl ColumnRef {
    /// Unqualified column reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    /// `qualifier.name` column reference.
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    /// Parse `name` or `alias.name`.
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((qualifier, name)) => Self::qualified(qualifier, name),
            None => Self::new(text),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Table reference in FROM or JOIN.
pub struct TableRef {
    /// Catalog table name.
    pub name: String,
    /// Optional alias.
    pub alias: Option<String>,
}

impl TableRef {
    /// Name the table is addressed by within the query.
    pub fn scope_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Join kind.
pub enum JoinKind {
    /// INNER JOIN.
    Inner,
    /// LEFT JOIN.
    Left,
    /// RIGHT JOIN.
    Right,
    /// FULL JOIN.
    Full,
}

#[derive(Debug, Clone, PartialEq)]
/// One link of a join chain.
pub struct Join {
    /// Join kind.
    pub kind: JoinKind,
    /// Table joined onto the accumulated result.
    pub table: TableRef,
    /// ON equalities, ANDed.
    pub on: Vec<JoinCondition>,
}

#[derive(Debug, Clone, PartialEq)]
/// `left = right` equality from an ON clause.
pub struct JoinCondition {
    /// Left side column.
    pub left: ColumnRef,
    /// Right side column.
    pub right: ColumnRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Comparison operator in WHERE and HAVING.
pub enum CompareOp {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `LIKE`
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::GtEq => ">=",
            CompareOp::LtEq => "<=",
            CompareOp::Like => "LIKE",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// WHERE condition: `attribute op value`.
pub struct Condition {
    /// Column the condition tests.
    pub attribute: ColumnRef,
    /// Comparison operator.
    pub op: CompareOp,
    /// Literal text with quotes removed.
    pub value: String,
    /// Whether the literal was single-quoted.
    pub quoted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Aggregate functions.
pub enum AggregateFunction {
    /// COUNT
    Count,
    /// SUM
    Sum,
    /// AVG
    Avg,
    /// MIN
    Min,
    /// MAX
    Max,
}

impl AggregateFunction {
    /// Look up a function by (case-insensitive) name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Lowercase function name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Aggregate call such as `count(*)` or `avg(s.grade)`.
pub struct AggregateCall {
    /// Function applied.
    pub function: AggregateFunction,
    /// Target column; `None` for `*`.
    pub argument: Option<ColumnRef>,
}

impl AggregateCall {
    /// Column label of the aggregate in grouped output.
    pub fn label(&self) -> String {
        match &self.argument {
            Some(column) => format!("{}({})", self.function.name(), column),
            None => format!("{}(*)", self.function.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// HAVING condition: `func(attr) op threshold`.
pub struct AggregateCondition {
    /// Aggregate the condition tests.
    pub call: AggregateCall,
    /// Comparison operator (never LIKE).
    pub op: CompareOp,
    /// Numeric threshold.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
/// ORDER BY key.
pub struct OrderByExpr {
    /// Sort key.
    pub expr: Expr,
    /// Ascending unless DESC was given.
    pub asc: bool,
}
