// crates/durable-map-sqlite/tests/common/mod.rs
// ============================================================================
// Module: SQLite Map Test Fixtures
// Description: Temporary databases, a people table, and its codec.
// Purpose: Share setup between SQLite integration test binaries.
// ============================================================================

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers.")]

use std::sync::Arc;

use durable_map_core::Codec;
use durable_map_core::CodecError;
use durable_map_core::ColumnMap;
use durable_map_core::DurableMap;
use durable_map_core::Row;
use durable_map_sqlite::SqliteDataSource;
use durable_map_sqlite::SqliteDataSourceConfig;
use rusqlite::Connection;
use tempfile::TempDir;

/// Table used by every fixture; names are capped at 16 characters.
pub const PEOPLE_DDL: &str = "CREATE TABLE people (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(name) <= 16)
);";

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

pub type PeopleMap = DurableMap<i64, Person, PersonCodec, Arc<SqliteDataSource>>;

/// Temporary database with the people table and a pooled source.
pub struct Fixture {
    pub source: Arc<SqliteDataSource>,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_ddl(PEOPLE_DDL)
    }

    pub fn with_ddl(ddl: &str) -> Self {
        Self::open(ddl, None)
    }

    /// People table behind a pool of exactly `pool_size` connections.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self::open(PEOPLE_DDL, Some(pool_size))
    }

    fn open(ddl: &str, pool_size: Option<usize>) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map.sqlite");
        Connection::open(&path).unwrap().execute_batch(ddl).unwrap();
        let mut config = SqliteDataSourceConfig::for_path(path);
        if let Some(pool_size) = pool_size {
            config.pool_size = pool_size;
        }
        let source = SqliteDataSource::new(config).unwrap();
        Self {
            source: Arc::new(source),
            dir,
        }
    }

    pub fn people(&self) -> PeopleMap {
        DurableMap::new(Arc::clone(&self.source), PersonCodec, "people").unwrap()
    }

    /// Reads the table directly, bypassing the pool.
    pub fn raw_rows(&self) -> Vec<(i64, String)> {
        let connection = Connection::open(self.dir.path().join("map.sqlite")).unwrap();
        let mut statement = connection.prepare("SELECT id, name FROM people ORDER BY id").unwrap();
        statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }
}
