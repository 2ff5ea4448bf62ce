//! Dialect-aware SQL construction for the engines.
//!
//! Statements are assembled from validated identifiers and bound values
//! only; the builder rejects any identifier outside a conservative
//! pattern, so the engines' schema whitelisting has a second line of
//! defense here.

/// SQL dialect, selecting the placeholder style.
#[derive(Debug, Clone, Copy)]
pub enum Dialect {
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }
}

/// A value bound into a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Convert a JSON scalar into a bindable value. Arrays and objects are
    /// bound as their JSON text form.
    pub fn from_json(value: &serde_json::Value) -> SqlValue {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else {
                    SqlValue::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

#[derive(Debug, Clone)]
pub enum SqlError {
    InvalidIdentifier { kind: &'static str, ident: String },
    EmptyInsert,
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            SqlError::EmptyInsert => write!(f, "INSERT requires at least one row"),
        }
    }
}

impl std::error::Error for SqlError {}

#[derive(Debug, Clone)]
struct Join {
    table: String,
    left_column: String,
    right_column: String,
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(String, SqlValue),
    NotEq(String, SqlValue),
    Gt(String, SqlValue),
    Lt(String, SqlValue),
    Between(String, SqlValue, SqlValue),
    Like {
        column: String,
        pattern: String,
        case_insensitive: bool,
    },
    In(String, Vec<SqlValue>),
    IsNull(String),
    IsNotNull(String),
    /// Disjunctive case-insensitive LIKE across several columns.
    AnyLike {
        columns: Vec<String>,
        pattern: String,
    },
}

/// A fluent builder for SELECT/COUNT/UPDATE/DELETE statements.
///
/// Conditions are conjunctive; [`search_any`](SqlBuilder::search_any) adds
/// one OR-group. Every build method returns `(sql, bind_values)`.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    table: String,
    joins: Vec<Join>,
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    dialect: Dialect,
}

impl SqlBuilder {
    pub fn new(table: &str, dialect: Dialect) -> Self {
        Self {
            table: table.to_string(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
            dialect,
        }
    }

    pub fn inner_join(mut self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            left_column: left_column.to_string(),
            right_column: right_column.to_string(),
        });
        self
    }

    pub fn where_eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn where_not_eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.conditions
            .push(Condition::NotEq(column.to_string(), value.into()));
        self
    }

    pub fn where_gt(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.conditions
            .push(Condition::Gt(column.to_string(), value.into()));
        self
    }

    pub fn where_lt(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.conditions
            .push(Condition::Lt(column.to_string(), value.into()));
        self
    }

    pub fn where_between(
        mut self,
        column: &str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.conditions
            .push(Condition::Between(column.to_string(), low.into(), high.into()));
        self
    }

    pub fn where_like(mut self, column: &str, pattern: &str) -> Self {
        self.conditions.push(Condition::Like {
            column: column.to_string(),
            pattern: pattern.to_string(),
            case_insensitive: false,
        });
        self
    }

    pub fn where_ilike(mut self, column: &str, pattern: &str) -> Self {
        self.conditions.push(Condition::Like {
            column: column.to_string(),
            pattern: pattern.to_lowercase(),
            case_insensitive: true,
        });
        self
    }

    pub fn where_in(mut self, column: &str, values: Vec<SqlValue>) -> Self {
        self.conditions
            .push(Condition::In(column.to_string(), values));
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNull(column.to_string()));
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.conditions
            .push(Condition::IsNotNull(column.to_string()));
        self
    }

    /// Add a case-insensitive OR-group matching `pattern` against any of
    /// `columns`. No columns means no condition.
    pub fn search_any(mut self, columns: &[&str], pattern: &str) -> Self {
        if !columns.is_empty() {
            self.conditions.push(Condition::AnyLike {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                pattern: pattern.to_lowercase(),
            });
        }
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset);
        self
    }

    /// Build a SELECT statement over the given columns.
    pub fn build_select(&self, columns: &[&str]) -> Result<(String, Vec<SqlValue>), SqlError> {
        let table = check_identifier(&self.table, false, "table")?;
        let mut column_list = Vec::with_capacity(columns.len());
        for column in columns {
            column_list.push(check_identifier(column, true, "column")?);
        }
        let mut sql = format!("SELECT {} FROM {table}", column_list.join(", "));
        let mut params = Vec::new();
        let mut placeholder_idx = 1usize;
        self.append_joins(&mut sql)?;
        self.append_where(&mut sql, &mut params, &mut placeholder_idx)?;
        self.append_order(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok((sql, params))
    }

    /// Build a COUNT(*) statement with the same joins and conditions.
    pub fn build_count(&self) -> Result<(String, Vec<SqlValue>), SqlError> {
        let table = check_identifier(&self.table, false, "table")?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let mut params = Vec::new();
        let mut placeholder_idx = 1usize;
        self.append_joins(&mut sql)?;
        self.append_where(&mut sql, &mut params, &mut placeholder_idx)?;
        Ok((sql, params))
    }

    /// Build an UPDATE statement applying `assignments` to the rows matched
    /// by the conditions.
    pub fn build_update(
        &self,
        assignments: &[(&str, SqlValue)],
    ) -> Result<(String, Vec<SqlValue>), SqlError> {
        let table = check_identifier(&self.table, false, "table")?;
        let mut sql = format!("UPDATE {table} SET ");
        let mut params = Vec::new();
        let mut placeholder_idx = 1usize;
        let mut clauses = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let column = check_identifier(column, false, "column")?;
            clauses.push(format!(
                "{column} = {}",
                self.dialect.placeholder(placeholder_idx)
            ));
            placeholder_idx += 1;
            params.push(value.clone());
        }
        sql.push_str(&clauses.join(", "));
        self.append_where(&mut sql, &mut params, &mut placeholder_idx)?;
        Ok((sql, params))
    }

    /// Build a DELETE statement for the rows matched by the conditions.
    pub fn build_delete(&self) -> Result<(String, Vec<SqlValue>), SqlError> {
        let table = check_identifier(&self.table, false, "table")?;
        let mut sql = format!("DELETE FROM {table}");
        let mut params = Vec::new();
        let mut placeholder_idx = 1usize;
        self.append_where(&mut sql, &mut params, &mut placeholder_idx)?;
        Ok((sql, params))
    }

    fn append_joins(&self, sql: &mut String) -> Result<(), SqlError> {
        for join in &self.joins {
            let table = check_identifier(&join.table, false, "table")?;
            let left = check_identifier(&join.left_column, false, "column")?;
            let right = check_identifier(&join.right_column, false, "column")?;
            sql.push_str(&format!(" INNER JOIN {table} ON {left} = {right}"));
        }
        Ok(())
    }

    fn append_where(
        &self,
        sql: &mut String,
        params: &mut Vec<SqlValue>,
        placeholder_idx: &mut usize,
    ) -> Result<(), SqlError> {
        if self.conditions.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        let mut first = true;
        for cond in &self.conditions {
            if !first {
                sql.push_str(" AND ");
            }
            first = false;
            match cond {
                Condition::Eq(col, val) => {
                    let col = check_identifier(col, false, "column")?;
                    sql.push_str(&format!(
                        "{col} = {}",
                        self.dialect.placeholder(*placeholder_idx)
                    ));
                    *placeholder_idx += 1;
                    params.push(val.clone());
                }
                Condition::NotEq(col, val) => {
                    let col = check_identifier(col, false, "column")?;
                    sql.push_str(&format!(
                        "{col} != {}",
                        self.dialect.placeholder(*placeholder_idx)
                    ));
                    *placeholder_idx += 1;
                    params.push(val.clone());
                }
                Condition::Gt(col, val) => {
                    let col = check_identifier(col, false, "column")?;
                    sql.push_str(&format!(
                        "{col} > {}",
                        self.dialect.placeholder(*placeholder_idx)
                    ));
                    *placeholder_idx += 1;
                    params.push(val.clone());
                }
                Condition::Lt(col, val) => {
                    let col = check_identifier(col, false, "column")?;
                    sql.push_str(&format!(
                        "{col} < {}",
                        self.dialect.placeholder(*placeholder_idx)
                    ));
                    *placeholder_idx += 1;
                    params.push(val.clone());
                }
                Condition::Between(col, low, high) => {
                    let col = check_identifier(col, false, "column")?;
                    let low_ph = self.dialect.placeholder(*placeholder_idx);
                    let high_ph = self.dialect.placeholder(*placeholder_idx + 1);
                    *placeholder_idx += 2;
                    sql.push_str(&format!("{col} BETWEEN {low_ph} AND {high_ph}"));
                    params.push(low.clone());
                    params.push(high.clone());
                }
                Condition::Like {
                    column,
                    pattern,
                    case_insensitive,
                } => {
                    let col = check_identifier(column, false, "column")?;
                    let placeholder = self.dialect.placeholder(*placeholder_idx);
                    *placeholder_idx += 1;
                    // Explicit ESCAPE so backslash-escaped metacharacters in
                    // the pattern match literally on every dialect.
                    if *case_insensitive {
                        sql.push_str(&format!("LOWER({col}) LIKE {placeholder} ESCAPE '\\'"));
                    } else {
                        sql.push_str(&format!("{col} LIKE {placeholder} ESCAPE '\\'"));
                    }
                    params.push(SqlValue::Text(pattern.clone()));
                }
                Condition::In(col, vals) => {
                    let col = check_identifier(col, false, "column")?;
                    if vals.is_empty() {
                        // An empty set matches nothing.
                        sql.push_str("1 = 0");
                        continue;
                    }
                    let placeholders: Vec<_> = vals
                        .iter()
                        .map(|_| {
                            let placeholder = self.dialect.placeholder(*placeholder_idx);
                            *placeholder_idx += 1;
                            placeholder
                        })
                        .collect();
                    sql.push_str(&format!("{col} IN ({})", placeholders.join(", ")));
                    params.extend(vals.iter().cloned());
                }
                Condition::IsNull(col) => {
                    let col = check_identifier(col, false, "column")?;
                    sql.push_str(&format!("{col} IS NULL"));
                }
                Condition::IsNotNull(col) => {
                    let col = check_identifier(col, false, "column")?;
                    sql.push_str(&format!("{col} IS NOT NULL"));
                }
                Condition::AnyLike { columns, pattern } => {
                    let mut branches = Vec::with_capacity(columns.len());
                    for column in columns {
                        let col = check_identifier(column, false, "column")?;
                        let placeholder = self.dialect.placeholder(*placeholder_idx);
                        *placeholder_idx += 1;
                        branches.push(format!("LOWER({col}) LIKE {placeholder} ESCAPE '\\'"));
                        params.push(SqlValue::Text(pattern.clone()));
                    }
                    sql.push_str(&format!("({})", branches.join(" OR ")));
                }
            }
        }
        Ok(())
    }

    fn append_order(&self, sql: &mut String) -> Result<(), SqlError> {
        if self.order.is_empty() {
            return Ok(());
        }
        sql.push_str(" ORDER BY ");
        let mut clauses = Vec::with_capacity(self.order.len());
        for (col, ascending) in &self.order {
            let col = check_identifier(col, false, "column")?;
            if *ascending {
                clauses.push(format!("{col} ASC"));
            } else {
                clauses.push(format!("{col} DESC"));
            }
        }
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        if let Some(limit) = self.limit_val {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset_val {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }
}

/// Build a multi-row INSERT statement.
pub fn build_insert(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    rows: &[Vec<SqlValue>],
) -> Result<(String, Vec<SqlValue>), SqlError> {
    if rows.is_empty() || columns.is_empty() {
        return Err(SqlError::EmptyInsert);
    }
    let table = check_identifier(table, false, "table")?;
    let mut column_list = Vec::with_capacity(columns.len());
    for column in columns {
        column_list.push(check_identifier(column, false, "column")?);
    }
    let mut params = Vec::new();
    let mut placeholder_idx = 1usize;
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let placeholders: Vec<_> = row
            .iter()
            .map(|_| {
                let placeholder = dialect.placeholder(placeholder_idx);
                placeholder_idx += 1;
                placeholder
            })
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));
        params.extend(row.iter().cloned());
    }
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {}",
        column_list.join(", "),
        tuples.join(", ")
    );
    Ok((sql, params))
}

fn check_identifier<'a>(
    ident: &'a str,
    allow_star: bool,
    kind: &'static str,
) -> Result<&'a str, SqlError> {
    if is_valid_identifier(ident, allow_star) {
        Ok(ident)
    } else {
        Err(SqlError::InvalidIdentifier {
            kind,
            ident: ident.to_string(),
        })
    }
}

fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
