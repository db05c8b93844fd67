//! A fluent query builder for constructing SQL statements over one table.
//!
//! All values travel as bind parameters. Identifiers (table, columns, the
//! optional join clause) come from repository configuration, never from the
//! caller's query string.
//!
//! # Example
//!
//! ```ignore
//! let q = QueryBuilder::new("drugs")
//!     .dialect(Dialect::Postgres)
//!     .where_eq("drugs.is_active", true)
//!     .where_gte("drugs.unit_price", 5)
//!     .order_by("drugs.created_at", SortDirection::Desc)
//!     .limit(10);
//! let stmt = q.build_select();
//! ```
use crate::row::RowValues;
use crate::sort::{SortClause, SortDirection};
use crate::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    #[default]
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Case-insensitive substring match of `col` against a bound pattern.
    fn contains_clause(self, col: &str, placeholder: &str) -> String {
        match self {
            Dialect::Postgres => format!("{col} ILIKE {placeholder} ESCAPE '\\'"),
            Dialect::Generic | Dialect::Sqlite => {
                format!("LOWER({col}) LIKE LOWER({placeholder}) ESCAPE '\\'")
            }
        }
    }
}

/// A single WHERE predicate. Predicates are AND-combined.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, SqlValue),
    NotEq(String, SqlValue),
    Gt(String, SqlValue),
    Gte(String, SqlValue),
    Lt(String, SqlValue),
    Lte(String, SqlValue),
    In(String, Vec<SqlValue>),
    IsNull(String),
    IsNotNull(String),
    /// Case-insensitive substring match on one column.
    Contains(String, String),
    /// Case-insensitive substring match OR-combined across several columns.
    AnyContains(Vec<String>, String),
}

/// Rendered SQL plus its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    from: Option<String>,
    select: String,
    conditions: Vec<Condition>,
    order: Vec<SortClause>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    dialect: Dialect,
}

struct SqlWriter {
    sql: String,
    params: Vec<SqlValue>,
    dialect: Dialect,
}

impl SqlWriter {
    fn new(sql: String, dialect: Dialect) -> Self {
        Self {
            sql,
            params: Vec::new(),
            dialect,
        }
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// A written column value. `NULL` is inlined so the column's own type
    /// applies; a bound null would carry the driver's default type.
    fn value(&mut self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            other => self.bind(other.clone()),
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            from: None,
            select: "*".to_string(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
            dialect: Dialect::Generic,
        }
    }

    /// Create a new builder with an explicit SQL dialect.
    pub fn new_with_dialect(table: &str, dialect: Dialect) -> Self {
        Self::new(table).dialect(dialect)
    }

    /// Set the SQL dialect (affects placeholder style and case-insensitive matching).
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Read from a joined source instead of the bare table.
    ///
    /// `from` is everything after `FROM` (e.g. `drugs LEFT JOIN companies ON ...`)
    /// and `select` the column list. Only reads use it; writes always target
    /// the base table.
    pub fn join(mut self, from: &str, select: &str) -> Self {
        self.from = Some(from.to_string());
        self.select = select.to_string();
        self
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.condition(Condition::Eq(column.to_string(), value.into()))
    }

    pub fn where_not_eq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.condition(Condition::NotEq(column.to_string(), value.into()))
    }

    pub fn where_gt(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.condition(Condition::Gt(column.to_string(), value.into()))
    }

    pub fn where_gte(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.condition(Condition::Gte(column.to_string(), value.into()))
    }

    pub fn where_lt(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.condition(Condition::Lt(column.to_string(), value.into()))
    }

    pub fn where_lte(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.condition(Condition::Lte(column.to_string(), value.into()))
    }

    pub fn where_in<V: Into<SqlValue>>(
        self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.condition(Condition::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.condition(Condition::IsNull(column.to_string()))
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.condition(Condition::IsNotNull(column.to_string()))
    }

    pub fn where_contains(self, column: &str, term: &str) -> Self {
        self.condition(Condition::Contains(column.to_string(), term.to_string()))
    }

    pub fn where_any_contains(self, columns: &[String], term: &str) -> Self {
        self.condition(Condition::AnyContains(columns.to_vec(), term.to_string()))
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order.push(SortClause::new(column, direction));
        self
    }

    pub fn order(mut self, clauses: impl IntoIterator<Item = SortClause>) -> Self {
        self.order.extend(clauses);
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

    fn source(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.table)
    }

    /// Build the SELECT for the configured source, conditions, order and page.
    pub fn build_select(&self) -> Statement {
        let mut w = SqlWriter::new(
            format!("SELECT {} FROM {}", self.select, self.source()),
            self.dialect,
        );
        self.append_where(&mut w);
        self.append_order(&mut w);
        self.append_limit_offset(&mut w);
        w.finish()
    }

    /// Build `SELECT COUNT(*)` over the filtered source.
    ///
    /// Order, limit and offset are ignored, so a builder that already carries
    /// them still counts the full filtered set.
    pub fn build_count(&self) -> Statement {
        let mut w = SqlWriter::new(
            format!("SELECT COUNT(*) FROM {}", self.source()),
            self.dialect,
        );
        self.append_where(&mut w);
        w.finish()
    }

    /// Build an existence probe against the base table.
    pub fn build_exists(&self) -> Statement {
        let mut w = SqlWriter::new(format!("SELECT 1 FROM {}", self.table), self.dialect);
        self.append_where(&mut w);
        w.sql.push_str(" LIMIT 1");
        w.finish()
    }

    /// Build a multi-row `INSERT ... RETURNING *`.
    ///
    /// Every row must carry the same columns in the same order; rows that
    /// differ must be inserted separately.
    pub fn build_insert(&self, rows: &[RowValues]) -> Result<Statement, QueryError> {
        let first = rows.first().ok_or(QueryError::EmptyInsert)?;
        let columns: Vec<&str> = first.columns().collect();
        if rows
            .iter()
            .any(|r| !r.columns().eq(columns.iter().copied()))
        {
            return Err(QueryError::RowShapeMismatch);
        }

        if columns.is_empty() {
            if rows.len() > 1 {
                return Err(QueryError::RowShapeMismatch);
            }
            let sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.table);
            return Ok(Statement {
                sql,
                params: Vec::new(),
            });
        }

        let mut w = SqlWriter::new(
            format!("INSERT INTO {} ({}) VALUES ", self.table, columns.join(", ")),
            self.dialect,
        );
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let placeholders: Vec<String> =
                row.iter().map(|(_, v)| w.value(v)).collect();
            tuples.push(format!("({})", placeholders.join(", ")));
        }
        w.sql.push_str(&tuples.join(", "));
        w.sql.push_str(" RETURNING *");
        Ok(w.finish())
    }

    /// Build `UPDATE ... SET ... WHERE ...`, optionally with `RETURNING *`.
    pub fn build_update(&self, set: &RowValues, returning: bool) -> Result<Statement, QueryError> {
        if set.is_empty() {
            return Err(QueryError::EmptyUpdate);
        }
        let mut w = SqlWriter::new(format!("UPDATE {} SET ", self.table), self.dialect);
        let assignments: Vec<String> = set
            .iter()
            .map(|(col, v)| {
                let value = w.value(v);
                format!("{col} = {value}")
            })
            .collect();
        w.sql.push_str(&assignments.join(", "));
        self.append_where(&mut w);
        if returning {
            w.sql.push_str(" RETURNING *");
        }
        Ok(w.finish())
    }

    /// Build `DELETE FROM ... WHERE ...`.
    pub fn build_delete(&self) -> Statement {
        let mut w = SqlWriter::new(format!("DELETE FROM {}", self.table), self.dialect);
        self.append_where(&mut w);
        w.finish()
    }

    fn append_where(&self, w: &mut SqlWriter) {
        if self.conditions.is_empty() {
            return;
        }
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|cond| self.render_condition(cond, w))
            .collect();
        w.sql.push_str(" WHERE ");
        w.sql.push_str(&clauses.join(" AND "));
    }

    fn render_condition(&self, cond: &Condition, w: &mut SqlWriter) -> String {
        match cond {
            Condition::Eq(col, SqlValue::Null) => format!("{col} IS NULL"),
            Condition::NotEq(col, SqlValue::Null) => format!("{col} IS NOT NULL"),
            Condition::Eq(col, val) => format!("{col} = {}", w.bind(val.clone())),
            Condition::NotEq(col, val) => format!("{col} != {}", w.bind(val.clone())),
            Condition::Gt(col, val) => format!("{col} > {}", w.bind(val.clone())),
            Condition::Gte(col, val) => format!("{col} >= {}", w.bind(val.clone())),
            Condition::Lt(col, val) => format!("{col} < {}", w.bind(val.clone())),
            Condition::Lte(col, val) => format!("{col} <= {}", w.bind(val.clone())),
            Condition::In(_, vals) if vals.is_empty() => "1 = 0".to_string(),
            Condition::In(col, vals) => {
                let placeholders: Vec<_> = vals.iter().map(|v| w.bind(v.clone())).collect();
                format!("{col} IN ({})", placeholders.join(", "))
            }
            Condition::IsNull(col) => format!("{col} IS NULL"),
            Condition::IsNotNull(col) => format!("{col} IS NOT NULL"),
            Condition::Contains(col, term) => {
                let placeholder = w.bind(SqlValue::Text(contains_pattern(term)));
                self.dialect.contains_clause(col, &placeholder)
            }
            Condition::AnyContains(cols, _) if cols.is_empty() => "1 = 1".to_string(),
            Condition::AnyContains(cols, term) => {
                let pattern = contains_pattern(term);
                let parts: Vec<String> = cols
                    .iter()
                    .map(|col| {
                        let placeholder = w.bind(SqlValue::Text(pattern.clone()));
                        self.dialect.contains_clause(col, &placeholder)
                    })
                    .collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    fn append_order(&self, w: &mut SqlWriter) {
        if self.order.is_empty() {
            return;
        }
        w.sql.push_str(" ORDER BY ");
        let clauses: Vec<_> = self
            .order
            .iter()
            .map(|c| format!("{} {}", c.column, c.direction.as_sql()))
            .collect();
        w.sql.push_str(&clauses.join(", "));
    }

    fn append_limit_offset(&self, w: &mut SqlWriter) {
        if let Some(limit) = self.limit_val {
            w.sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset_val {
            w.sql.push_str(&format!(" OFFSET {offset}"));
        }
    }
}

/// `%term%` with LIKE wildcards in the term escaped, so they match literally.
fn contains_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid {kind} identifier: {ident}")]
    InvalidIdentifier { kind: &'static str, ident: String },
    #[error("Insert requires at least one row")]
    EmptyInsert,
    #[error("Rows in a bulk insert must share the same columns")]
    RowShapeMismatch,
    #[error("Update requires at least one column")]
    EmptyUpdate,
}

/// Check an identifier against a conservative pattern: dot-separated
/// segments of ASCII letters, digits and `_`, not starting with a digit.
pub fn validate_identifier(ident: &str, kind: &'static str) -> Result<(), QueryError> {
    if is_valid_identifier(ident) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier {
            kind,
            ident: ident.to_string(),
        })
    }
}

fn is_valid_identifier(ident: &str) -> bool {
    !ident.is_empty() && ident.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_select() {
        let stmt = QueryBuilder::new("users").build_select();
        assert_eq!(stmt.sql, "SELECT * FROM users");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_where_eq() {
        let stmt = QueryBuilder::new("users")
            .where_eq("email", "a@b.com")
            .build_select();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE email = ?");
        assert_eq!(stmt.params, vec![SqlValue::Text("a@b.com".into())]);
    }

    #[test]
    fn test_complex_query() {
        let stmt = QueryBuilder::new("users")
            .select("id, name")
            .where_eq("status", "active")
            .where_gte("age", 18)
            .where_lte("age", 65)
            .order_by("id", SortDirection::Asc)
            .limit(10)
            .offset(20)
            .build_select();
        assert_eq!(
            stmt.sql,
            "SELECT id, name FROM users WHERE status = ? AND age >= ? AND age <= ? ORDER BY id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("active".into()), SqlValue::Int(18), SqlValue::Int(65)]
        );
    }

    #[test]
    fn test_count_ignores_order_and_page() {
        let q = QueryBuilder::new("users")
            .where_eq("active", true)
            .order_by("id", SortDirection::Desc)
            .limit(5)
            .offset(5);
        let count = q.build_count();
        assert_eq!(count.sql, "SELECT COUNT(*) FROM users WHERE active = ?");
        assert_eq!(count.params, vec![SqlValue::Bool(true)]);
        // building the count left the page query intact
        assert!(q.build_select().sql.ends_with("ORDER BY id DESC LIMIT 5 OFFSET 5"));
    }

    #[test]
    fn test_postgres_placeholders() {
        let stmt = QueryBuilder::new_with_dialect("users", Dialect::Postgres)
            .where_eq("status", "active")
            .where_in("role", ["admin", "user"])
            .build_select();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE status = $1 AND role IN ($2, $3)"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let stmt = QueryBuilder::new("users")
            .where_in::<i64>("id", [])
            .build_delete();
        assert_eq!(stmt.sql, "DELETE FROM users WHERE 1 = 0");
    }

    #[test]
    fn test_search_group_is_or_combined_and_anded() {
        let stmt = QueryBuilder::new_with_dialect("drugs", Dialect::Postgres)
            .where_any_contains(&["drugs.name".to_string(), "drugs.code".to_string()], "para")
            .where_eq("drugs.is_active", true)
            .build_select();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM drugs WHERE (drugs.name ILIKE $1 ESCAPE '\\' OR drugs.code ILIKE $2 ESCAPE '\\') AND drugs.is_active = $3"
        );
        assert_eq!(stmt.params[0], SqlValue::Text("%para%".into()));
    }

    #[test]
    fn test_sqlite_contains_lowercases() {
        let stmt = QueryBuilder::new_with_dialect("drugs", Dialect::Sqlite)
            .where_contains("name", "Para")
            .build_select();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM drugs WHERE LOWER(name) LIKE LOWER(?) ESCAPE '\\'"
        );
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_join_source_for_reads_only() {
        let q = QueryBuilder::new("drugs")
            .join(
                "drugs LEFT JOIN companies ON companies.id = drugs.company_id",
                "drugs.*, companies.name AS company_name",
            )
            .where_eq("drugs.id", 7);
        assert_eq!(
            q.build_select().sql,
            "SELECT drugs.*, companies.name AS company_name FROM drugs LEFT JOIN companies ON companies.id = drugs.company_id WHERE drugs.id = ?"
        );
        assert_eq!(
            q.build_count().sql,
            "SELECT COUNT(*) FROM drugs LEFT JOIN companies ON companies.id = drugs.company_id WHERE drugs.id = ?"
        );
        assert_eq!(q.build_delete().sql, "DELETE FROM drugs WHERE drugs.id = ?");
    }

    #[test]
    fn test_insert_many() {
        let rows = vec![
            RowValues::new().set("name", "a").set("amount", 5),
            RowValues::new().set("name", "b").set("amount", 15),
        ];
        let stmt = QueryBuilder::new_with_dialect("t", Dialect::Postgres)
            .build_insert(&rows)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO t (name, amount) VALUES ($1, $2), ($3, $4) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn test_insert_rejects_mixed_shapes() {
        let rows = vec![
            RowValues::new().set("name", "a"),
            RowValues::new().set("name", "b").set("amount", 1),
        ];
        let err = QueryBuilder::new("t").build_insert(&rows).unwrap_err();
        assert_eq!(err, QueryError::RowShapeMismatch);
    }

    #[test]
    fn test_insert_default_values() {
        let stmt = QueryBuilder::new("t")
            .build_insert(&[RowValues::new()])
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO t DEFAULT VALUES RETURNING *");
    }

    #[test]
    fn test_update_binds_set_before_where() {
        let set = RowValues::new().set("name", "x").set("amount", 4);
        let stmt = QueryBuilder::new_with_dialect("t", Dialect::Postgres)
            .where_eq("t.id", 3)
            .build_update(&set, true)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE t SET name = $1, amount = $2 WHERE t.id = $3 RETURNING *"
        );
        assert_eq!(stmt.params[2], SqlValue::Int(3));
    }

    #[test]
    fn test_null_writes_are_inlined() {
        let set = RowValues::new()
            .set("company_id", SqlValue::Null)
            .set("name", "x");
        let stmt = QueryBuilder::new_with_dialect("t", Dialect::Postgres)
            .where_eq("t.id", 3)
            .build_update(&set, false)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE t SET company_id = NULL, name = $1 WHERE t.id = $2"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("x".into()), SqlValue::Int(3)]);

        let rows = vec![
            RowValues::new().set("name", "a").set("amount", SqlValue::Null),
            RowValues::new().set("name", "b").set("amount", 2),
        ];
        let stmt = QueryBuilder::new_with_dialect("t", Dialect::Postgres)
            .build_insert(&rows)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO t (name, amount) VALUES ($1, NULL), ($2, $3) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_eq_null_renders_is_null() {
        let stmt = QueryBuilder::new_with_dialect("t", Dialect::Postgres)
            .where_eq("company_id", SqlValue::Null)
            .where_not_eq("code", SqlValue::Null)
            .where_eq("name", "a")
            .build_select();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM t WHERE company_id IS NULL AND code IS NOT NULL AND name = $1"
        );
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_update_requires_columns() {
        let err = QueryBuilder::new("t")
            .build_update(&RowValues::new(), false)
            .unwrap_err();
        assert_eq!(err, QueryError::EmptyUpdate);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("inventory.drugs.id", "column").is_ok());
        assert!(validate_identifier("_private", "column").is_ok());
        let err = validate_identifier("users;drop", "table").unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { .. }));
        assert!(validate_identifier("1abc", "column").is_err());
        assert!(validate_identifier("a..b", "column").is_err());
        assert!(validate_identifier("", "column").is_err());
    }
}
