// crates/durable-map-sqlite/src/source.rs
// ============================================================================
// Module: SQLite Data Source
// Description: Pooled SQLite connections behind the durable map facade.
// Purpose: Lend connections with guaranteed release and clean transactions.
// Dependencies: durable-map-core, rusqlite, serde, tracing
// ============================================================================

//! ## Overview
//! [`SqliteDataSource`] opens a fixed number of connections to one database
//! file and lends them round-robin. Connections open with the configured
//! journal and sync pragmas plus a busy timeout, so lock contention turns into
//! waiting and, past the timeout, into [`MapError::Transient`].
//!
//! Invariants:
//! - A lent connection is exclusively owned by one closure at a time.
//! - A connection released inside a transaction is rolled back first.
//! - Bind values never appear in logs or error messages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use durable_map_core::DataSource;
use durable_map_core::MapError;
use durable_map_core::Row;
use durable_map_core::SqlConnection;
use durable_map_core::SqlDialect;
use durable_map_core::SqlStatement;
use durable_map_core::SqlValue;
use rusqlite::CachedStatement;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::ToSql;
use rusqlite::params_from_iter;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::Value;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout for `SQLite` connections, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of pooled connections.
const DEFAULT_POOL_SIZE: usize = 4;
/// Upper bound on pooled connections.
pub const MAX_POOL_SIZE: usize = 64;
/// Maximum length for a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum length for the full database path.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode; readers do not block the writer.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` data source.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `pool_size` is between 1 and [`MAX_POOL_SIZE`].
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteDataSourceConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl SqliteDataSourceConfig {
    /// Builds a config for `path` with default settings.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Config`] when a field is out of range.
    pub fn validate(&self) -> Result<(), MapError> {
        validate_store_path(&self.path)?;
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(MapError::Config(format!(
                "pool_size out of range: {} (max {MAX_POOL_SIZE})",
                self.pool_size
            )));
        }
        Ok(())
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default connection pool size.
const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Maps a `rusqlite` error onto a durable map error kind.
///
/// Busy and locked databases are transient; constraint failures keep their
/// own kind so callers can tell a lost insert race from a broken database.
/// Statements naming a table or column the schema lacks are programming errors.
#[must_use]
pub fn classify_sqlite_error(error: &rusqlite::Error) -> MapError {
    let message = error.to_string();
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => MapError::Transient(message),
        Some(ErrorCode::ConstraintViolation) => MapError::Constraint(message),
        Some(ErrorCode::Unknown) if is_schema_mismatch(&message) => MapError::Programming(message),
        _ => MapError::Database(message),
    }
}

/// Returns true when error text reports a missing table or column.
fn is_schema_mismatch(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("no such table") || lower.contains("no such column")
}

/// Shorthand for `map_err` call sites.
fn db_error(error: rusqlite::Error) -> MapError {
    classify_sqlite_error(&error)
}

// ============================================================================
// SECTION: Data Source
// ============================================================================

/// `SQLite`-backed data source with a fixed connection pool.
///
/// # Invariants
/// - `connections` is non-empty.
/// - Connection access is serialized per slot through a mutex.
pub struct SqliteDataSource {
    /// Configuration used to open the pool.
    config: SqliteDataSourceConfig,
    /// Pooled connections.
    connections: Vec<Mutex<Connection>>,
    /// Round-robin cursor into `connections`.
    cursor: AtomicUsize,
}

impl SqliteDataSource {
    /// Opens the pool described by `config`, creating the database file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the config is invalid or a connection cannot
    /// be opened.
    pub fn new(config: SqliteDataSourceConfig) -> Result<Self, MapError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let mut connections = Vec::with_capacity(config.pool_size);
        for _ in 0 .. config.pool_size {
            connections.push(Mutex::new(open_connection(&config)?));
        }
        debug!(
            path = %config.path.display(),
            pool_size = config.pool_size,
            journal_mode = config.journal_mode.pragma_value(),
            "opened sqlite data source"
        );
        Ok(Self {
            config,
            connections,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Configuration the pool was opened with.
    #[must_use]
    pub const fn config(&self) -> &SqliteDataSourceConfig {
        &self.config
    }

    /// Verifies a pooled connection can execute a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the query fails.
    pub fn check_connection(&self) -> Result<(), MapError> {
        let guard = self.acquire();
        guard.query_row("SELECT 1", [], |_| Ok(())).map_err(db_error)
    }

    /// Takes the first idle connection, or waits on the next one in rotation.
    fn acquire(&self) -> MutexGuard<'_, Connection> {
        let len = self.connections.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0 .. len {
            let Some(slot) = self.connections.get((start + offset) % len) else {
                continue;
            };
            match slot.try_lock() {
                Ok(guard) => return reset(guard),
                Err(TryLockError::Poisoned(poisoned)) => return reset(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {}
            }
        }
        let guard = self.connections[start].lock().unwrap_or_else(PoisonError::into_inner);
        reset(guard)
    }
}

impl DataSource for SqliteDataSource {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn with_connection<T, F>(&self, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlConnection) -> Result<T, MapError>,
    {
        let mut connection = SqliteConnection {
            connection: self.acquire(),
        };
        action(&mut connection)
    }
}

/// Rolls back a transaction left open by a closure that panicked mid-block.
fn reset(guard: MutexGuard<'_, Connection>) -> MutexGuard<'_, Connection> {
    if !guard.is_autocommit() {
        warn!("sqlite connection acquired inside a transaction; rolling back");
        if let Err(err) = guard.execute_batch("ROLLBACK") {
            warn!(error = %err, "sqlite rollback on acquire failed");
        }
    }
    guard
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// A pooled connection lent to one closure.
struct SqliteConnection<'a> {
    /// Exclusive access to the pooled connection.
    connection: MutexGuard<'a, Connection>,
}

impl SqlConnection for SqliteConnection<'_> {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn SqlStatement + 'c>, MapError> {
        let statement = self.connection.prepare_cached(sql).map_err(db_error)?;
        Ok(Box::new(SqliteStatement {
            statement,
        }))
    }

    fn begin(&mut self) -> Result<(), MapError> {
        self.connection.execute_batch("BEGIN IMMEDIATE").map_err(db_error)
    }

    fn commit(&mut self) -> Result<(), MapError> {
        self.connection.execute_batch("COMMIT").map_err(db_error)
    }

    fn rollback(&mut self) -> Result<(), MapError> {
        self.connection.execute_batch("ROLLBACK").map_err(db_error)
    }

    fn in_transaction(&self) -> bool {
        !self.connection.is_autocommit()
    }
}

impl Drop for SqliteConnection<'_> {
    fn drop(&mut self) {
        if self.connection.is_autocommit() {
            return;
        }
        warn!("sqlite connection released inside a transaction; rolling back");
        if let Err(err) = self.connection.execute_batch("ROLLBACK") {
            warn!(error = %err, "sqlite rollback on release failed");
        }
    }
}

// ============================================================================
// SECTION: Statement
// ============================================================================

/// A cached prepared statement on a lent connection.
struct SqliteStatement<'c> {
    /// Statement returned to the connection cache on drop.
    statement: CachedStatement<'c>,
}

impl SqlStatement for SqliteStatement<'_> {
    fn execute(&mut self, params: &[SqlValue]) -> Result<u64, MapError> {
        let affected = self
            .statement
            .execute(params_from_iter(params.iter().map(SqliteParam)))
            .map_err(db_error)?;
        Ok(u64::try_from(affected).unwrap_or(u64::MAX))
    }

    fn query_first(&mut self, params: &[SqlValue]) -> Result<Option<Row>, MapError> {
        let names: Vec<String> =
            self.statement.column_names().into_iter().map(str::to_string).collect();
        let mut rows =
            self.statement.query(params_from_iter(params.iter().map(SqliteParam))).map_err(db_error)?;
        let Some(row) = rows.next().map_err(db_error)? else {
            return Ok(None);
        };
        let mut columns = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let value = from_value_ref(&name, row.get_ref(index).map_err(db_error)?)?;
            columns.push((name, value));
        }
        Ok(Some(Row::new(columns)))
    }
}

// ============================================================================
// SECTION: Value Conversion
// ============================================================================

/// Borrowed bind parameter.
struct SqliteParam<'a>(&'a SqlValue);

impl ToSql for SqliteParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlValue::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            SqlValue::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            SqlValue::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value)),
            SqlValue::Bool(value) => ToSqlOutput::Owned(Value::Integer(i64::from(*value))),
        })
    }
}

/// Converts a result column into an owned value.
fn from_value_ref(column: &str, value: ValueRef<'_>) -> Result<SqlValue, MapError> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(value) => SqlValue::Integer(value),
        ValueRef::Real(value) => SqlValue::Real(value),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                MapError::Database(format!("column {column} holds invalid utf-8 text"))
            })?;
            SqlValue::Text(text.to_string())
        }
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), MapError> {
    let Some(parent) = path.parent() else {
        return Err(MapError::Config("database path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| MapError::Database(err.to_string()))
}

/// Validates database paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), MapError> {
    if path.as_os_str().is_empty() {
        return Err(MapError::Config("database path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(MapError::Config("database path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(MapError::Config(
                "database path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(MapError::Config(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteDataSourceConfig) -> Result<Connection, MapError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability and lock waiting.
fn apply_pragmas(connection: &Connection, config: &SqliteDataSourceConfig) -> Result<(), MapError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    Ok(())
}
