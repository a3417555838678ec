use crate::ast::*;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
}

impl ParserError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParserError {}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Keyword(String),
    Ident(String, bool),
    Number(String),
    String(String),
    Operator(String),
    Symbol(char),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "{}", k),
            TokenKind::Ident(name, _) => write!(f, "{}", name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "'{}'", s),
            TokenKind::Operator(op) => write!(f, "{}", op),
            TokenKind::Symbol(c) => write!(f, "{}", c),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_token(&mut self) -> Result<Token, ParserError> {
        self.skip_ws_and_comments();
        let Some(ch) = self.peek_char() else {
            return Ok(Token { kind: TokenKind::Eof });
        };

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = self.pos;
            self.pos += ch.len_utf8();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.pos += c.len_utf8();
                } else {
                    break;
                }
            }
            let word = &self.input[start..self.pos];
            let upper = word.to_ascii_uppercase();
            if is_keyword(&upper) {
                return Ok(Token {
                    kind: TokenKind::Keyword(upper),
                });
            }
            return Ok(Token {
                kind: TokenKind::Ident(word.to_string(), false),
            });
        }

        if ch.is_ascii_digit() {
            let start = self.pos;
            self.pos += 1;
            let mut saw_dot = false;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.pos += 1;
                } else if c == '.' && !saw_dot {
                    saw_dot = true;
                    self.pos += 1;
                } else {
                    break;
                }
            }
            let num = &self.input[start..self.pos];
            return Ok(Token {
                kind: TokenKind::Number(num.to_string()),
            });
        }

        match ch {
            '\'' => return self.lex_string(),
            '"' => return self.lex_quoted_ident('"'),
            '`' => return self.lex_quoted_ident('`'),
            _ => {}
        }

        let two = self.input.get(self.pos..self.pos + 2).unwrap_or("");
        if matches!(two, ">=" | "<=" | "<>" | "!=") {
            self.pos += 2;
            return Ok(Token {
                kind: TokenKind::Operator(two.to_string()),
            });
        }

        self.pos += ch.len_utf8();
        let token = match ch {
            '(' | ')' | ',' | '.' | ';' => TokenKind::Symbol(ch),
            '*' | '-' | '+' | '=' | '<' | '>' => TokenKind::Operator(ch.to_string()),
            _ => {
                return Err(ParserError::new(format!(
                    "unexpected character '{}'",
                    ch
                )))
            }
        };
        Ok(Token { kind: token })
    }

    fn lex_string(&mut self) -> Result<Token, ParserError> {
        self.pos += 1;
        let mut value = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\'' {
                if self.input[self.pos + 1..].starts_with('\'') {
                    value.push('\'');
                    self.pos += 2;
                } else {
                    self.pos += 1;
                    return Ok(Token {
                        kind: TokenKind::String(value),
                    });
                }
            } else {
                value.push(c);
                self.pos += c.len_utf8();
            }
        }
        Err(ParserError::new("unterminated string literal"))
    }

    fn lex_quoted_ident(&mut self, quote: char) -> Result<Token, ParserError> {
        self.pos += quote.len_utf8();
        let mut value = String::new();
        while let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            if c == quote {
                return Ok(Token {
                    kind: TokenKind::Ident(value, true),
                });
            }
            value.push(c);
        }
        Err(ParserError::new("unterminated quoted identifier"))
    }

    fn skip_ws_and_comments(&mut self) {
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];
            if rest.starts_with("--") {
                match rest.find('\n') {
                    Some(idx) => self.pos += idx + 1,
                    None => self.pos = self.input.len(),
                }
                continue;
            }
            match rest.chars().next() {
                Some(c) if c.is_whitespace() => self.pos += c.len_utf8(),
                _ => break,
            }
        }
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "SELECT"
            | "FROM"
            | "WHERE"
            | "GROUP"
            | "BY"
            | "HAVING"
            | "ORDER"
            | "ASC"
            | "DESC"
            | "DISTINCT"
            | "AND"
            | "OR"
            | "NOT"
            | "NULL"
            | "LIKE"
            | "JOIN"
            | "INNER"
            | "LEFT"
            | "RIGHT"
            | "FULL"
            | "OUTER"
            | "ON"
            | "AS"
            | "CREATE"
            | "TABLE"
            | "PRIMARY"
            | "KEY"
            | "INSERT"
            | "INTO"
            | "VALUES"
    )
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParserError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(ParserError::new(format!(
                "expected keyword {} but found {}",
                keyword,
                self.current()
            )))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.current() {
            TokenKind::Keyword(k) if k == keyword => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn current_is_keyword(&self, keyword: &str) -> bool {
        matches!(self.current(), TokenKind::Keyword(k) if k == keyword)
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        match self.current() {
            TokenKind::Symbol(c) if *c == symbol => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), ParserError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(ParserError::new(format!(
                "expected symbol {} but found {}",
                symbol,
                self.current()
            )))
        }
    }

    fn eat_operator(&mut self, op: &str) -> bool {
        match self.current() {
            TokenKind::Operator(o) if o == op => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn expect_end(&mut self) -> Result<(), ParserError> {
        self.eat_symbol(';');
        match self.current() {
            TokenKind::Eof => Ok(()),
            other => Err(ParserError::new(format!("unexpected token {}", other))),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        let stmt = match self.current() {
            TokenKind::Keyword(k) if k == "SELECT" => Statement::Select(self.parse_select()?),
            TokenKind::Keyword(k) if k == "CREATE" => {
                Statement::CreateTable(self.parse_create_table()?)
            }
            TokenKind::Keyword(k) if k == "INSERT" => Statement::Insert(self.parse_insert()?),
            _ => return Err(ParserError::new("unexpected statement")),
        };
        self.expect_end()?;
        Ok(stmt)
    }

    fn parse_create_table(&mut self) -> Result<CreateTable, ParserError> {
        self.expect_keyword("CREATE")?;
        self.expect_keyword("TABLE")?;
        let name = self.parse_ident()?;
        self.expect_symbol('(')?;
        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        loop {
            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                self.expect_symbol('(')?;
                if !primary_key.is_empty() {
                    return Err(ParserError::new("multiple primary keys are not allowed"));
                }
                primary_key = self.parse_ident_list(')')?;
            } else {
                let column = self.parse_ident()?;
                let data_type = self.parse_data_type()?;
                if self.eat_keyword("PRIMARY") {
                    self.expect_keyword("KEY")?;
                    if !primary_key.is_empty() {
                        return Err(ParserError::new("multiple primary keys are not allowed"));
                    }
                    primary_key.push(column.clone());
                }
                columns.push(ColumnDef {
                    name: column,
                    data_type,
                });
            }
            if self.eat_symbol(')') {
                break;
            }
            self.expect_symbol(',')?;
        }
        Ok(CreateTable {
            name,
            columns,
            primary_key,
        })
    }

    fn parse_data_type(&mut self) -> Result<DataType, ParserError> {
        let type_name = match self.current() {
            TokenKind::Ident(value, false) => value.to_ascii_uppercase(),
            other => {
                return Err(ParserError::new(format!(
                    "expected column type but found {}",
                    other
                )))
            }
        };
        self.advance();
        // VARCHAR(20), DECIMAL(10,2): the length is not enforced
        if self.eat_symbol('(') {
            while !self.eat_symbol(')') {
                match self.current() {
                    TokenKind::Number(_) | TokenKind::Symbol(',') => self.advance(),
                    other => {
                        return Err(ParserError::new(format!(
                            "unexpected token {} in type {}",
                            other, type_name
                        )))
                    }
                }
            }
        }
        if type_name.contains("INT") {
            Ok(DataType::Integer)
        } else if type_name.contains("CHAR")
            || type_name.contains("CLOB")
            || type_name.contains("TEXT")
            || type_name.contains("STRING")
        {
            Ok(DataType::Text)
        } else if type_name.contains("BOOL") {
            Ok(DataType::Bool)
        } else if type_name.contains("REAL")
            || type_name.contains("FLOA")
            || type_name.contains("DOUB")
            || type_name.contains("NUM")
            || type_name.contains("DEC")
        {
            Ok(DataType::Float)
        } else {
            Err(ParserError::new(format!(
                "unsupported column type {}",
                type_name
            )))
        }
    }

    fn parse_insert(&mut self) -> Result<Insert, ParserError> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.parse_ident()?;
        let columns = if self.eat_symbol('(') {
            self.parse_ident_list(')')?
        } else {
            Vec::new()
        };
        self.expect_keyword("VALUES")?;
        let mut rows = Vec::new();
        loop {
            self.expect_symbol('(')?;
            let mut values = Vec::new();
            loop {
                values.push(self.parse_literal()?);
                if self.eat_symbol(')') {
                    break;
                }
                self.expect_symbol(',')?;
            }
            rows.push(values);
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(Insert {
            table,
            columns,
            rows,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, ParserError> {
        let negative = self.eat_operator("-");
        let literal = match self.current() {
            TokenKind::Number(n) => {
                let text = if negative { format!("-{}", n) } else { n.clone() };
                Literal::Number(text)
            }
            _ if negative => return Err(ParserError::new("expected number after '-'")),
            TokenKind::Keyword(k) if k == "NULL" => Literal::Null,
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::Ident(word, false) => Literal::Word(word.clone()),
            other => {
                return Err(ParserError::new(format!(
                    "expected literal but found {}",
                    other
                )))
            }
        };
        self.advance();
        Ok(literal)
    }

    fn parse_select(&mut self) -> Result<Query, ParserError> {
        self.expect_keyword("SELECT")?;
        let distinct = self.eat_keyword("DISTINCT");
        let projection = self.parse_select_list()?;
        self.expect_keyword("FROM")?;
        let from = self.parse_table_list()?;
        let joins = self.parse_join_chain()?;
        let selection = if self.eat_keyword("WHERE") {
            self.parse_conditions()?
        } else {
            Vec::new()
        };
        let group_by = if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            self.parse_column_list()?
        } else {
            Vec::new()
        };
        let having = if self.eat_keyword("HAVING") {
            if group_by.is_empty() {
                return Err(ParserError::new(
                    "HAVING clause cannot be used without a GROUP BY clause",
                ));
            }
            self.parse_having_conditions()?
        } else {
            Vec::new()
        };
        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };
        Ok(Query {
            distinct,
            projection,
            from,
            joins,
            selection,
            group_by,
            having,
            order_by,
        })
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectItem>, ParserError> {
        let mut items = Vec::new();
        loop {
            if self.eat_operator("*") {
                items.push(SelectItem::Wildcard);
            } else {
                items.push(SelectItem::Expr(self.parse_expr()?));
            }
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(items)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParserError> {
        if matches!(self.peek(1), TokenKind::Symbol('(')) {
            Ok(Expr::Aggregate(self.parse_aggregate_call()?))
        } else {
            Ok(Expr::Column(self.parse_column_ref()?))
        }
    }

    fn parse_aggregate_call(&mut self) -> Result<AggregateCall, ParserError> {
        let name = self.parse_ident()?;
        let function = AggregateFunction::from_name(&name)
            .ok_or_else(|| ParserError::new(format!("unknown aggregate function {}", name)))?;
        self.expect_symbol('(')?;
        let argument = if self.eat_operator("*") {
            if function != AggregateFunction::Count {
                return Err(ParserError::new(format!(
                    "{}(*) is not supported",
                    function.name()
                )));
            }
            None
        } else {
            Some(self.parse_column_ref()?)
        };
        self.expect_symbol(')')?;
        Ok(AggregateCall { function, argument })
    }

    fn parse_table_list(&mut self) -> Result<Vec<TableRef>, ParserError> {
        let mut tables = Vec::new();
        loop {
            tables.push(self.parse_table_ref()?);
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(tables)
    }

    fn parse_table_ref(&mut self) -> Result<TableRef, ParserError> {
        let name = self.parse_ident()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.parse_ident()?)
        } else if self.is_alias_start() {
            Some(self.parse_ident()?)
        } else {
            None
        };
        Ok(TableRef { name, alias })
    }

    fn parse_join_kind(&mut self) -> Result<Option<JoinKind>, ParserError> {
        let kind = if self.eat_keyword("JOIN") {
            return Ok(Some(JoinKind::Inner));
        } else if self.eat_keyword("INNER") {
            JoinKind::Inner
        } else if self.eat_keyword("LEFT") {
            self.eat_keyword("OUTER");
            JoinKind::Left
        } else if self.eat_keyword("RIGHT") {
            self.eat_keyword("OUTER");
            JoinKind::Right
        } else if self.eat_keyword("FULL") {
            self.eat_keyword("OUTER");
            JoinKind::Full
        } else {
            return Ok(None);
        };
        self.expect_keyword("JOIN")?;
        Ok(Some(kind))
    }

    fn parse_join_chain(&mut self) -> Result<Vec<Join>, ParserError> {
        let mut joins = Vec::new();
        while let Some(kind) = self.parse_join_kind()? {
            let table = self.parse_table_ref()?;
            if !self.eat_keyword("ON") {
                return Err(ParserError::new(format!(
                    "expected ON after JOIN {}",
                    table.name
                )));
            }
            let mut on = Vec::new();
            loop {
                on.push(self.parse_join_condition()?);
                if !self.eat_keyword("AND") {
                    break;
                }
            }
            joins.push(Join { kind, table, on });
        }
        Ok(joins)
    }

    fn parse_join_condition(&mut self) -> Result<JoinCondition, ParserError> {
        let left = self.parse_column_ref()?;
        if !self.eat_operator("=") {
            return Err(ParserError::new(format!(
                "invalid join condition on {}: only equality is supported",
                left
            )));
        }
        let right = self.parse_column_ref()?;
        Ok(JoinCondition { left, right })
    }

    fn parse_conditions(&mut self) -> Result<Vec<Condition>, ParserError> {
        let mut conditions = Vec::new();
        loop {
            conditions.push(self.parse_condition()?);
            if !self.eat_keyword("AND") {
                break;
            }
        }
        if self.current_is_keyword("OR") {
            return Err(ParserError::new(
                "OR is not supported: WHERE conditions can only be combined with AND",
            ));
        }
        Ok(conditions)
    }

    fn parse_condition(&mut self) -> Result<Condition, ParserError> {
        let attribute = self.parse_column_ref().map_err(|_| {
            ParserError::new(format!("invalid condition near {}", self.current()))
        })?;
        let op = if self.eat_keyword("LIKE") {
            CompareOp::Like
        } else if let Some(op) = self.parse_compare_operator() {
            op
        } else {
            return Err(ParserError::new(format!(
                "invalid condition on {}: expected one of =, >, <, >=, <=, LIKE",
                attribute
            )));
        };
        let (value, quoted) = self.parse_condition_value().map_err(|_| {
            ParserError::new(format!("invalid condition on {}: missing value", attribute))
        })?;
        Ok(Condition {
            attribute,
            op,
            value,
            quoted,
        })
    }

    fn parse_condition_value(&mut self) -> Result<(String, bool), ParserError> {
        if self.eat_operator("-") {
            return match self.current() {
                TokenKind::Number(n) => {
                    let value = format!("-{}", n);
                    self.advance();
                    Ok((value, false))
                }
                _ => Err(ParserError::new("expected number after '-'")),
            };
        }
        match self.current() {
            TokenKind::String(s) => {
                let value = s.clone();
                self.advance();
                Ok((value, true))
            }
            TokenKind::Number(n) => {
                let value = n.clone();
                self.advance();
                Ok((value, false))
            }
            TokenKind::Keyword(k) if k == "NULL" => {
                self.advance();
                Ok(("NULL".to_string(), false))
            }
            TokenKind::Ident(_, _) | TokenKind::Keyword(_) => {
                Ok((self.parse_column_ref()?.to_string(), false))
            }
            other => Err(ParserError::new(format!("unexpected token {}", other))),
        }
    }

    fn parse_compare_operator(&mut self) -> Option<CompareOp> {
        let op = match self.current() {
            TokenKind::Operator(op) => match op.as_str() {
                "=" => CompareOp::Eq,
                ">" => CompareOp::Gt,
                "<" => CompareOp::Lt,
                ">=" => CompareOp::GtEq,
                "<=" => CompareOp::LtEq,
                _ => return None,
            },
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_having_conditions(&mut self) -> Result<Vec<AggregateCondition>, ParserError> {
        let mut conditions = Vec::new();
        loop {
            conditions.push(self.parse_having_condition()?);
            if !self.eat_keyword("AND") {
                break;
            }
        }
        if self.current_is_keyword("OR") {
            return Err(ParserError::new(
                "OR is not supported: HAVING conditions can only be combined with AND",
            ));
        }
        Ok(conditions)
    }

    fn parse_having_condition(&mut self) -> Result<AggregateCondition, ParserError> {
        if !matches!(self.peek(1), TokenKind::Symbol('(')) {
            return Err(ParserError::new(format!(
                "invalid HAVING condition near {}: expected func(attr) op value",
                self.current()
            )));
        }
        let call = self.parse_aggregate_call()?;
        let op = self.parse_compare_operator().ok_or_else(|| {
            ParserError::new(format!(
                "invalid HAVING condition on {}: expected one of =, >, <, >=, <=",
                call.label()
            ))
        })?;
        let negative = self.eat_operator("-");
        let value = match self.current() {
            TokenKind::Number(n) => n.parse::<f64>().map_err(|_| {
                ParserError::new(format!("invalid HAVING threshold {}", n))
            })?,
            other => {
                return Err(ParserError::new(format!(
                    "invalid HAVING threshold {}",
                    other
                )))
            }
        };
        self.advance();
        Ok(AggregateCondition {
            call,
            op,
            value: if negative { -value } else { value },
        })
    }

    fn parse_column_list(&mut self) -> Result<Vec<ColumnRef>, ParserError> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_column_ref()?);
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(items)
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpr>, ParserError> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let asc = if self.eat_keyword("DESC") {
                false
            } else {
                self.eat_keyword("ASC");
                true
            };
            items.push(OrderByExpr { expr, asc });
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(items)
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef, ParserError> {
        let first = self.parse_ident()?;
        if self.eat_symbol('.') {
            let name = self.parse_ident()?;
            return Ok(ColumnRef::qualified(first, name));
        }
        Ok(ColumnRef::new(first))
    }

    fn parse_ident(&mut self) -> Result<String, ParserError> {
        match self.current() {
            TokenKind::Ident(value, _) => {
                let ident = value.clone();
                self.advance();
                Ok(ident)
            }
            TokenKind::Keyword(value) if !is_clause_keyword(value) => {
                let ident = value.to_ascii_lowercase();
                self.advance();
                Ok(ident)
            }
            other => Err(ParserError::new(format!(
                "expected identifier but found {}",
                other
            ))),
        }
    }

    fn parse_ident_list(&mut self, terminator: char) -> Result<Vec<String>, ParserError> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_ident()?);
            if self.eat_symbol(terminator) {
                break;
            }
            self.expect_symbol(',')?;
        }
        Ok(items)
    }

    fn is_alias_start(&self) -> bool {
        matches!(self.current(), TokenKind::Ident(_, _))
    }
}

/// Keywords that open or join clauses and therefore never double as names.
fn is_clause_keyword(word: &str) -> bool {
    matches!(
        word,
        "SELECT"
            | "FROM"
            | "WHERE"
            | "GROUP"
            | "HAVING"
            | "ORDER"
            | "AND"
            | "OR"
            | "JOIN"
            | "INNER"
            | "LEFT"
            | "RIGHT"
            | "FULL"
            | "ON"
            | "NULL"
            | "LIKE"
    )
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParserError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

/// Parse one command: SELECT, CREATE TABLE or INSERT.
pub fn parse_statement(input: &str) -> Result<Statement, ParserError> {
    let mut parser = Parser::new(tokenize(input)?);
    parser.parse_statement()
}

/// Parse a SELECT command into a [`Query`].
pub fn parse_select(input: &str) -> Result<Query, ParserError> {
    let mut parser = Parser::new(tokenize(input)?);
    let query = parser.parse_select()?;
    parser.expect_end()?;
    Ok(query)
}

/// Parse a SELECT command that arrives already split into words, as a
/// line-oriented client sends it.
pub fn parse_command<S: AsRef<str>>(words: &[S]) -> Result<Query, ParserError> {
    let text = words
        .iter()
        .map(|word| word.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    parse_select(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_select_with_where() {
        let query = parse_select("select name from students where grade > 80").unwrap();
        assert!(!query.distinct);
        assert_eq!(
            query.projection,
            vec![SelectItem::Expr(Expr::Column(ColumnRef::new("name")))]
        );
        assert_eq!(
            query.from,
            vec![TableRef {
                name: "students".to_string(),
                alias: None
            }]
        );
        assert_eq!(
            query.selection,
            vec![Condition {
                attribute: ColumnRef::new("grade"),
                op: CompareOp::Gt,
                value: "80".to_string(),
                quoted: false,
            }]
        );
    }

    #[test]
    fn parse_quoted_literal_and_like() {
        let query =
            parse_select("SELECT * FROM t WHERE name = 'O''Neil' AND city LIKE 'Cl%'").unwrap();
        assert_eq!(query.projection, vec![SelectItem::Wildcard]);
        assert_eq!(query.selection.len(), 2);
        assert_eq!(query.selection[0].value, "O'Neil");
        assert!(query.selection[0].quoted);
        assert_eq!(query.selection[1].op, CompareOp::Like);
        assert_eq!(query.selection[1].value, "Cl%");
    }

    #[test]
    fn parse_negative_and_identifier_literals() {
        let query = parse_select("SELECT a FROM t x WHERE a >= -5 AND x.b = x.c").unwrap();
        assert_eq!(query.selection[0].value, "-5");
        assert!(!query.selection[0].quoted);
        assert_eq!(query.selection[1].attribute, ColumnRef::qualified("x", "b"));
        assert_eq!(query.selection[1].value, "x.c");
        assert_eq!(query.from[0].alias.as_deref(), Some("x"));
    }

    #[test]
    fn parse_join_chain() {
        let sql = "SELECT s.name, c.title FROM students s \
                   INNER JOIN enrollments e ON s.id = e.student_id \
                   LEFT OUTER JOIN courses c ON e.course_id = c.id AND e.year = c.year \
                   WHERE s.grade > 50";
        let query = parse_select(sql).unwrap();
        assert_eq!(query.from.len(), 1);
        assert_eq!(query.joins.len(), 2);
        assert_eq!(query.joins[0].kind, JoinKind::Inner);
        assert_eq!(query.joins[0].table.scope_name(), "e");
        assert_eq!(query.joins[1].kind, JoinKind::Left);
        assert_eq!(query.joins[1].on.len(), 2);
        assert_eq!(
            query.joins[1].on[1],
            JoinCondition {
                left: ColumnRef::qualified("e", "year"),
                right: ColumnRef::qualified("c", "year"),
            }
        );
        assert_eq!(query.selection.len(), 1);
        assert_eq!(query.tables().count(), 3);
    }

    #[test]
    fn parse_group_by_having_order_by() {
        let sql = "SELECT DISTINCT grade, count(*) FROM students GROUP BY grade \
                   HAVING count(*) >= 1 AND AVG(id) < 10.5 ORDER BY grade DESC, count(*)";
        let query = parse_select(sql).unwrap();
        assert!(query.distinct);
        assert_eq!(query.group_by, vec![ColumnRef::new("grade")]);
        assert_eq!(query.having.len(), 2);
        assert_eq!(query.having[0].call.label(), "count(*)");
        assert_eq!(query.having[0].value, 1.0);
        assert_eq!(query.having[1].call.label(), "avg(id)");
        assert_eq!(query.having[1].op, CompareOp::Lt);
        assert_eq!(query.having[1].value, 10.5);
        assert!(!query.order_by[0].asc);
        assert!(query.order_by[1].asc);
        assert_eq!(query.order_by[1].expr.label(), "count(*)");
        assert_eq!(query.aggregates().len(), 2);
    }

    #[test]
    fn having_without_group_by_is_rejected() {
        let err = parse_select("SELECT count(*) FROM t HAVING count(*) > 1").unwrap_err();
        assert!(err.message.contains("HAVING"));
    }

    #[test]
    fn or_is_rejected() {
        let err = parse_select("SELECT a FROM t WHERE a = 1 OR a = 2").unwrap_err();
        assert!(err.message.contains("OR is not supported"));
    }

    #[test]
    fn invalid_condition_short_circuits() {
        let err = parse_select("SELECT a FROM t WHERE a 5 ORDER BY a").unwrap_err();
        assert!(err.message.starts_with("invalid condition"));
        let err = parse_select("SELECT a FROM t WHERE a != 5").unwrap_err();
        assert!(err.message.starts_with("invalid condition"));
    }

    #[test]
    fn parse_command_joins_words() {
        let words = ["select", "name", "from", "students", "where", "grade", ">", "80"];
        let query = parse_command(&words).unwrap();
        assert_eq!(query, parse_select("select name from students where grade > 80").unwrap());
    }

    #[test]
    fn parse_create_table_and_insert() {
        let stmt = parse_statement(
            "CREATE TABLE students(id INTEGER PRIMARY KEY, name VARCHAR(20), grade FLOAT, active BOOL)",
        )
        .unwrap();
        match stmt {
            Statement::CreateTable(create) => {
                assert_eq!(create.name, "students");
                assert_eq!(create.columns.len(), 4);
                assert_eq!(create.columns[1].data_type, DataType::Text);
                assert_eq!(create.columns[2].data_type, DataType::Float);
                assert_eq!(create.primary_key, vec!["id".to_string()]);
            }
            _ => panic!("expected create table"),
        }

        let stmt = parse_statement("INSERT INTO students VALUES (1, 'Ann', -9.5, true), (2, NULL, 1, false);").unwrap();
        match stmt {
            Statement::Insert(insert) => {
                assert_eq!(insert.rows.len(), 2);
                assert_eq!(insert.rows[0][2], Literal::Number("-9.5".to_string()));
                assert_eq!(insert.rows[0][3], Literal::Word("true".to_string()));
                assert_eq!(insert.rows[1][1], Literal::Null);
            }
            _ => panic!("expected insert"),
        }
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(parse_select("SELECT a FROM t LIMIT 5").is_err());
        assert!(parse_select("SELECT a FROM t;").is_ok());
    }
}
