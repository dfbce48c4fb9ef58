// crates/durable-map-core/src/statement.rs
// ============================================================================
// Module: Statement Composition
// Description: Parameterized SQL text built from codec column maps.
// Purpose: Keep statement layout and bind order in one place per dialect.
// Dependencies: crate::values, crate::error
// ============================================================================

//! ## Overview
//! Each builder walks a [`ColumnMap`] once, emitting a placeholder into the
//! statement text and pushing the value onto the parameter list in the same
//! step, so text and bindings cannot drift apart.
//!
//! Invariants:
//! - Every value reaches the driver as a bound parameter.
//! - Only the table name and codec column names are spliced into text; both
//!   are caller-trusted identifiers.
//! - `WHERE` predicates join with ` AND `; assignment and column lists with `, `.
//! - In combined lists key columns precede value columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::MapError;
use crate::values::ColumnMap;
use crate::values::SqlValue;

// ============================================================================
// SECTION: Dialect
// ============================================================================

/// SQL flavor spoken by a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// `?` placeholders, `INSERT t SET …`, `ON DUPLICATE KEY UPDATE`, `FOR UPDATE`.
    MySql,
    /// `$n` placeholders, `INSERT INTO … VALUES`, `ON CONFLICT … DO UPDATE`, `FOR UPDATE`.
    Postgres,
    /// `?n` placeholders, `ON CONFLICT … DO UPDATE`; row locking comes from
    /// the write lock taken when the transaction begins.
    Sqlite,
}

impl SqlDialect {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Suffix appended to a locking select.
    #[must_use]
    pub const fn lock_clause(self) -> &'static str {
        match self {
            Self::MySql | Self::Postgres => " FOR UPDATE",
            Self::Sqlite => "",
        }
    }

    /// Renders the placeholder for the one-based parameter `position`.
    fn placeholder(self, position: usize) -> String {
        match self {
            Self::MySql => "?".to_string(),
            Self::Postgres => format!("${position}"),
            Self::Sqlite => format!("?{position}"),
        }
    }
}

// ============================================================================
// SECTION: Bound Statement
// ============================================================================

/// SQL text paired with its positional parameters.
///
/// # Invariants
/// - `params.len()` equals the number of placeholders in `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// Statement text.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

impl BoundStatement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn unbound(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Accumulates statement text and parameters in lock step.
struct Builder {
    /// Target dialect.
    dialect: SqlDialect,
    /// Statement text so far.
    sql: String,
    /// Parameters bound so far.
    params: Vec<SqlValue>,
}

impl Builder {
    /// Starts a statement with the given leading text.
    fn new(dialect: SqlDialect, head: &str) -> Self {
        Self {
            dialect,
            sql: head.to_string(),
            params: Vec::new(),
        }
    }

    /// Appends literal text.
    fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    /// Binds a value and appends its placeholder.
    fn bind(&mut self, value: &SqlValue) -> &mut Self {
        self.params.push(value.clone());
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Appends `col = ?` terms for every column, joined by `separator`.
    fn assignments(&mut self, columns: &ColumnMap, separator: &str) -> &mut Self {
        for (index, (name, value)) in columns.iter().enumerate() {
            if index > 0 {
                self.push(separator);
            }
            self.push(name).push(" = ").bind(value);
        }
        self
    }

    /// Appends a parenthesized column-name list.
    fn column_list(&mut self, columns: &ColumnMap) -> &mut Self {
        let names: Vec<&str> = columns.names().collect();
        self.push("(").push(&names.join(", ")).push(")")
    }

    /// Appends a parenthesized placeholder list binding every column.
    fn value_list(&mut self, columns: &ColumnMap) -> &mut Self {
        self.push("(");
        for (index, value) in columns.values().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            self.bind(value);
        }
        self.push(")")
    }

    /// Finishes the statement.
    fn finish(&mut self) -> BoundStatement {
        BoundStatement {
            sql: std::mem::take(&mut self.sql),
            params: std::mem::take(&mut self.params),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Rejects an empty column mapping.
///
/// # Errors
///
/// Returns [`MapError::Programming`] when `columns` is empty.
pub fn require_columns(columns: &ColumnMap, role: &str) -> Result<(), MapError> {
    if columns.is_empty() {
        return Err(MapError::Programming(format!("codec produced no {role} columns")));
    }
    Ok(())
}

/// Rejects key/value mappings that are empty or share a column.
///
/// # Errors
///
/// Returns [`MapError::Programming`] when either mapping is empty or they overlap.
pub fn require_disjoint(keys: &ColumnMap, values: &ColumnMap) -> Result<(), MapError> {
    require_columns(keys, "key")?;
    require_columns(values, "value")?;
    if let Some(column) = keys.overlap(values) {
        return Err(MapError::Programming(format!(
            "column {column} is both a key and a value column"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// `SELECT * FROM t WHERE k = ? AND …`, optionally locking the matched row.
#[must_use]
pub fn select_by_key(
    dialect: SqlDialect,
    table: &str,
    keys: &ColumnMap,
    for_update: bool,
) -> BoundStatement {
    let mut builder = Builder::new(dialect, "SELECT * FROM ");
    builder.push(table).push(" WHERE ").assignments(keys, " AND ");
    if for_update {
        builder.push(" LIMIT 1").push(dialect.lock_clause());
    }
    builder.finish()
}

/// `SELECT EXISTS(SELECT * FROM t WHERE c = ? AND …)`.
#[must_use]
pub fn exists_matching(dialect: SqlDialect, table: &str, columns: &ColumnMap) -> BoundStatement {
    let mut builder = Builder::new(dialect, "SELECT EXISTS(SELECT * FROM ");
    builder.push(table).push(" WHERE ").assignments(columns, " AND ").push(")");
    builder.finish()
}

/// `SELECT EXISTS(SELECT * FROM t)`.
#[must_use]
pub fn exists_any(table: &str) -> BoundStatement {
    BoundStatement::unbound(format!("SELECT EXISTS(SELECT * FROM {table})"))
}

/// `SELECT COUNT(*) FROM t`.
#[must_use]
pub fn count_rows(table: &str) -> BoundStatement {
    BoundStatement::unbound(format!("SELECT COUNT(*) FROM {table}"))
}

/// `DELETE FROM t`.
#[must_use]
pub fn delete_all(table: &str) -> BoundStatement {
    BoundStatement::unbound(format!("DELETE FROM {table}"))
}

/// `DELETE FROM t WHERE k = ? AND …`.
#[must_use]
pub fn delete_by_key(dialect: SqlDialect, table: &str, keys: &ColumnMap) -> BoundStatement {
    let mut builder = Builder::new(dialect, "DELETE FROM ");
    builder.push(table).push(" WHERE ").assignments(keys, " AND ");
    builder.finish()
}

/// `UPDATE t SET v = ?, … WHERE k = ? AND …`.
#[must_use]
pub fn update_by_key(
    dialect: SqlDialect,
    table: &str,
    keys: &ColumnMap,
    values: &ColumnMap,
) -> BoundStatement {
    let mut builder = Builder::new(dialect, "UPDATE ");
    builder
        .push(table)
        .push(" SET ")
        .assignments(values, ", ")
        .push(" WHERE ")
        .assignments(keys, " AND ");
    builder.finish()
}

/// Plain insert of key then value columns.
#[must_use]
pub fn insert(
    dialect: SqlDialect,
    table: &str,
    keys: &ColumnMap,
    values: &ColumnMap,
) -> BoundStatement {
    let columns = keys.chain(values);
    let mut builder = insert_head(dialect, table, &columns);
    builder.finish()
}

/// Insert that updates every column on a unique-key collision.
///
/// Each column is bound twice: once in the insert list, once in the update list.
#[must_use]
pub fn upsert(
    dialect: SqlDialect,
    table: &str,
    keys: &ColumnMap,
    values: &ColumnMap,
) -> BoundStatement {
    let columns = keys.chain(values);
    let mut builder = insert_head(dialect, table, &columns);
    match dialect {
        SqlDialect::MySql => {
            builder.push(" ON DUPLICATE KEY UPDATE ");
        }
        SqlDialect::Postgres | SqlDialect::Sqlite => {
            let key_names: Vec<&str> = keys.names().collect();
            builder.push(" ON CONFLICT (").push(&key_names.join(", ")).push(") DO UPDATE SET ");
        }
    }
    builder.assignments(&columns, ", ");
    builder.finish()
}

/// Emits the dialect's insert prefix binding every column once.
fn insert_head(dialect: SqlDialect, table: &str, columns: &ColumnMap) -> Builder {
    let mut builder = Builder::new(dialect, "INSERT ");
    match dialect {
        SqlDialect::MySql => {
            builder.push(table).push(" SET ").assignments(columns, ", ");
        }
        SqlDialect::Postgres | SqlDialect::Sqlite => {
            builder
                .push("INTO ")
                .push(table)
                .push(" ")
                .column_list(columns)
                .push(" VALUES ")
                .value_list(columns);
        }
    }
    builder
}
