// crates/durable-map-core/tests/common/mod.rs
// ============================================================================
// Module: Scripted Data Source
// Description: In-process data source that records statements and replays
//              scripted results.
// Purpose: Observe the map's transactional protocol without a database.
// ============================================================================

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers.")]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use durable_map_core::Codec;
use durable_map_core::CodecError;
use durable_map_core::ColumnMap;
use durable_map_core::DataSource;
use durable_map_core::MapError;
use durable_map_core::Row;
use durable_map_core::SqlConnection;
use durable_map_core::SqlDialect;
use durable_map_core::SqlStatement;
use durable_map_core::SqlValue;

// ============================================================================
// SECTION: Scripted Source
// ============================================================================

/// Shared state behind the single scripted connection.
#[derive(Default)]
pub struct Script {
    /// Every statement or transaction verb seen, in order.
    pub log: Vec<String>,
    /// Results handed out by `query_first`, front first; empty means no row.
    pub rows: VecDeque<Option<Row>>,
    /// Results handed out by `execute`, front first; empty means one row affected.
    pub affected: VecDeque<Result<u64, MapError>>,
    /// True between `begin` and `commit`/`rollback`.
    pub in_transaction: bool,
}

/// Data source with one scripted connection.
#[derive(Default)]
pub struct ScriptedSource {
    /// Script shared by every borrowed connection.
    pub script: Mutex<Script>,
}

impl ScriptedSource {
    pub fn with_rows(rows: Vec<Option<Row>>) -> Self {
        let source = Self::default();
        source.lock().rows = rows.into();
        source
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }
}

struct ScriptedConnection<'a> {
    script: std::sync::MutexGuard<'a, Script>,
}

struct ScriptedStatement<'c> {
    script: &'c mut Script,
    sql: String,
}

impl SqlStatement for ScriptedStatement<'_> {
    fn execute(&mut self, _params: &[SqlValue]) -> Result<u64, MapError> {
        self.script.log.push(self.sql.clone());
        self.script.affected.pop_front().unwrap_or(Ok(1))
    }

    fn query_first(&mut self, _params: &[SqlValue]) -> Result<Option<Row>, MapError> {
        self.script.log.push(self.sql.clone());
        Ok(self.script.rows.pop_front().flatten())
    }
}

impl SqlConnection for ScriptedConnection<'_> {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }

    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn SqlStatement + 'c>, MapError> {
        Ok(Box::new(ScriptedStatement {
            script: &mut *self.script,
            sql: sql.to_string(),
        }))
    }

    fn begin(&mut self) -> Result<(), MapError> {
        self.script.log.push("BEGIN".to_string());
        self.script.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), MapError> {
        self.script.log.push("COMMIT".to_string());
        self.script.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), MapError> {
        self.script.log.push("ROLLBACK".to_string());
        self.script.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.script.in_transaction
    }
}

impl DataSource for ScriptedSource {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }

    fn with_connection<T, F>(&self, action: F) -> Result<T, MapError>
    where
        F: FnOnce(&mut dyn SqlConnection) -> Result<T, MapError>,
    {
        let mut connection = ScriptedConnection {
            script: self.lock(),
        };
        let result = action(&mut connection);
        if connection.in_transaction() {
            connection.script.log.push("RELEASE ROLLBACK".to_string());
            connection.script.in_transaction = false;
        }
        result
    }
}

// ============================================================================
// SECTION: Person Codec
// ============================================================================

/// Value stored under an integer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Maps `i64` ids to `id` and [`Person`] to `name`.
pub struct PersonCodec;

impl Codec<i64, Person> for PersonCodec {
    fn encode_key(&self, key: &i64) -> Result<ColumnMap, CodecError> {
        Ok(ColumnMap::new().with("id", *key))
    }

    fn encode_value(&self, value: &Person) -> Result<ColumnMap, CodecError> {
        if value.name.is_empty() {
            return Err(CodecError::new("name must be non-empty"));
        }
        Ok(ColumnMap::new().with("name", value.name.as_str()))
    }

    fn decode_value(&self, row: &Row) -> Result<Person, CodecError> {
        let name = row
            .get("name")
            .ok_or_else(|| CodecError::missing_column("name"))?
            .as_str()
            .ok_or_else(|| CodecError::unexpected_type("name", "text"))?;
        Ok(Person::named(name))
    }
}

/// Builds the row a `SELECT *` returns for `(id, name)`.
pub fn person_row(id: i64, name: &str) -> Row {
    Row::new(vec![
        ("id".to_string(), SqlValue::Integer(id)),
        ("name".to_string(), SqlValue::Text(name.to_string())),
    ])
}

/// Builds a one-column result row.
pub fn scalar_row(value: SqlValue) -> Row {
    Row::new(vec![("result".to_string(), value)])
}
