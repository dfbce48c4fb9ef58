// crates/durable-map-core/src/datasource.rs
// ============================================================================
// Module: Data Source Facade
// Description: Scoped connection and statement access over a connection pool.
// Purpose: Guarantee release and clean transaction state on every exit path.
// Dependencies: crate::values, crate::statement, crate::error, tracing
// ============================================================================

//! ## Overview
//! A [`DataSource`] lends a [`SqlConnection`] for the duration of a closure and
//! takes it back afterwards, whatever the closure returned. Backends own the
//! pooling; the map only ever sees these traits.
//!
//! Invariants:
//! - A connection is never returned to its pool inside an open transaction;
//!   backends roll back on release, including during unwinding.
//! - Driver failures surface as [`MapError`] kinds, already classified.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::error::MapError;
use crate::statement::BoundStatement;
use crate::statement::SqlDialect;
use crate::values::Row;
use crate::values::SqlValue;

// ============================================================================
// SECTION: Statement and Connection
// ============================================================================

/// A prepared statement bound to a borrowed connection.
pub trait SqlStatement {
    /// Executes the statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when execution fails.
    fn execute(&mut self, params: &[SqlValue]) -> Result<u64, MapError>;

    /// Runs the statement as a query and returns its first row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the query fails or a column cannot be read.
    fn query_first(&mut self, params: &[SqlValue]) -> Result<Option<Row>, MapError>;
}

/// A connection borrowed from a [`DataSource`].
pub trait SqlConnection {
    /// Dialect spoken by this connection.
    fn dialect(&self) -> SqlDialect;

    /// Prepares `sql` for execution on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the statement cannot be prepared.
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn SqlStatement + 'c>, MapError>;

    /// Leaves auto-commit mode and opens a transaction whose reads may lock rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the transaction cannot be started.
    fn begin(&mut self) -> Result<(), MapError>;

    /// Commits the open transaction and returns to auto-commit mode.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the commit fails.
    fn commit(&mut self) -> Result<(), MapError>;

    /// Rolls back the open transaction and returns to auto-commit mode.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the rollback fails.
    fn rollback(&mut self) -> Result<(), MapError>;

    /// Returns true while a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Prepares and executes a bound statement.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when preparation or execution fails.
    fn execute(&mut self, statement: &BoundStatement) -> Result<u64, MapError> {
        debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");
        let mut prepared = self.prepare(&statement.sql)?;
        prepared.execute(&statement.params)
    }

    /// Prepares a bound statement and returns its first row.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when preparation or the query fails.
    fn query_first(&mut self, statement: &BoundStatement) -> Result<Option<Row>, MapError> {
        debug!(sql = %statement.sql, params = statement.params.len(), "querying statement");
        let mut prepared = self.prepare(&statement.sql)?;
        prepared.query_first(&statement.params)
    }
}

// ============================================================================
// SECTION: Data Source
// ============================================================================

/// Pool of connections offering scoped access.
pub trait DataSource: Send + Sync {
    /// Dialect spoken by connections from this source.
    fn dialect(&self) -> SqlDialect;

    /// Borrows a connection, runs `action`, and always releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when no connection can be acquired or `action` fails.
    fn with_connection<T, F>(&self, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlConnection) -> Result<T, MapError>;

    /// Borrows a connection, prepares `sql`, runs `action` on the statement,
    /// then closes the statement and releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when acquisition, preparation, or `action` fails.
    fn with_statement<T, F>(&self, sql: &str, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlStatement) -> Result<T, MapError>,
    {
        self.with_connection(|connection| {
            debug!(sql = %sql, "preparing scoped statement");
            let mut statement = connection.prepare(sql)?;
            action(statement.as_mut())
        })
    }
}

impl<D: DataSource> DataSource for Arc<D> {
    fn dialect(&self) -> SqlDialect {
        (**self).dialect()
    }

    fn with_connection<T, F>(&self, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlConnection) -> Result<T, MapError>,
    {
        (**self).with_connection(action)
    }

    fn with_statement<T, F>(&self, sql: &str, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlStatement) -> Result<T, MapError>,
    {
        (**self).with_statement(sql, action)
    }
}

impl<D: DataSource> DataSource for &D {
    fn dialect(&self) -> SqlDialect {
        (**self).dialect()
    }

    fn with_connection<T, F>(&self, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlConnection) -> Result<T, MapError>,
    {
        (**self).with_connection(action)
    }

    fn with_statement<T, F>(&self, sql: &str, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlStatement) -> Result<T, MapError>,
    {
        (**self).with_statement(sql, action)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the first column of a single-row result as a boolean.
///
/// # Errors
///
/// Returns [`MapError::Database`] when the row is missing or not boolean.
pub fn first_column_bool(row: Option<Row>) -> Result<bool, MapError> {
    row.as_ref()
        .and_then(|row| row.get_index(0))
        .and_then(SqlValue::as_bool)
        .ok_or_else(|| MapError::Database("expected a boolean result column".to_string()))
}

/// Reads the first column of a single-row result as a non-negative count.
///
/// # Errors
///
/// Returns [`MapError::Database`] when the row is missing or not a count.
pub fn first_column_count(row: Option<Row>) -> Result<u64, MapError> {
    row.as_ref()
        .and_then(|row| row.get_index(0))
        .and_then(SqlValue::as_i64)
        .and_then(|count| u64::try_from(count).ok())
        .ok_or_else(|| MapError::Database("expected a count result column".to_string()))
}

/// Rolls back after a failure, keeping the original error when rollback also fails.
pub fn rollback_quietly(connection: &mut dyn SqlConnection) {
    if let Err(err) = connection.rollback() {
        warn!(error = %err, "rollback failed after error");
    }
}
