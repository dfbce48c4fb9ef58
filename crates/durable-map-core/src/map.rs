// crates/durable-map-core/src/map.rs
// ============================================================================
// Module: Durable Concurrent Map
// Description: Map operations over a single table with transactional updates.
// Purpose: Give concurrent callers linearizable per-key updates backed by SQL.
// Dependencies: crate::codec, crate::datasource, crate::statement, tracing
// ============================================================================

//! ## Overview
//! [`DurableMap`] is stateless beyond its table name, codec, and data source:
//! every entry is a row and every operation is one or more statements.
//! Read-modify-write operations run as a locked block: open a transaction,
//! lock the key's row with a locking select, write, then commit (or roll back
//! on any failure before the error escapes).
//!
//! Invariants:
//! - At most one row exists per key tuple (the table's unique constraint).
//! - Operations on the same key that lock its row linearize in commit order.
//! - Listeners only observe committed changes.
//! - `put_if_absent` reads without a lock; a concurrent insert of the same key
//!   surfaces as [`MapError::Constraint`].
//! - `put_all` commits entry by entry and is not atomic across entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;

use crate::codec::Codec;
use crate::datasource::DataSource;
use crate::datasource::SqlConnection;
use crate::datasource::first_column_bool;
use crate::datasource::first_column_count;
use crate::datasource::rollback_quietly;
use crate::error::MapError;
use crate::events::ListenerRegistry;
use crate::events::MapEvent;
use crate::events::Monitorable;
use crate::events::SharedListener;
use crate::statement;
use crate::statement::require_columns;
use crate::statement::require_disjoint;
use crate::values::ColumnMap;

// ============================================================================
// SECTION: Locked Block Outcome
// ============================================================================

/// How a locked block ends once its body has run.
enum Finish<T> {
    /// Commit the writes and return the value.
    Commit(T),
    /// Nothing to write; release the lock and return the value.
    Rollback(T),
}

// ============================================================================
// SECTION: Durable Map
// ============================================================================

/// Concurrent key/value map persisted one row per entry.
///
/// # Invariants
/// - `table` is non-empty and used verbatim in statement text.
/// - The map holds no locks of its own; concurrency is the database's.
pub struct DurableMap<K, V, C, D> {
    /// Connection pool facade.
    data_source: D,
    /// Key/value column projection.
    codec: C,
    /// Backing table name.
    table: String,
    /// Listeners notified after committed changes.
    listeners: ListenerRegistry<SharedListener<K, V>>,
}

impl<K, V, C, D> DurableMap<K, V, C, D>
where
    V: PartialEq,
    C: Codec<K, V>,
    D: DataSource,
{
    /// Creates a map over `table`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Programming`] when `table` is blank.
    pub fn new(data_source: D, codec: C, table: impl Into<String>) -> Result<Self, MapError> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(MapError::Programming("table name must be non-empty".to_string()));
        }
        Ok(Self {
            data_source,
            codec,
            table,
            listeners: ListenerRegistry::new(),
        })
    }

    /// Backing table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Codec used for every operation.
    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Data source used for every operation.
    #[must_use]
    pub const fn data_source(&self) -> &D {
        &self.data_source
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Returns the value stored under `key` without locking.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when encoding, the query, or decoding fails.
    pub fn get(&self, key: &K) -> Result<Option<V>, MapError> {
        let keys = self.encode_key(key)?;
        self.data_source.with_connection(|connection| self.select(connection, &keys, false))
    }

    /// Returns true when a row exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when encoding or the query fails.
    pub fn contains_key(&self, key: &K) -> Result<bool, MapError> {
        let keys = self.encode_key(key)?;
        let statement = statement::exists_matching(self.data_source.dialect(), &self.table, &keys);
        self.data_source.with_statement(&statement.sql, |prepared| {
            first_column_bool(prepared.query_first(&statement.params)?)
        })
    }

    /// Returns true when some row's value columns all equal `value`'s encoding.
    ///
    /// Columns are compared with SQL `=`, so a value encoding any column as
    /// [`SqlValue::Null`](crate::values::SqlValue::Null) never matches, even
    /// against a row stored from that same value.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when encoding or the query fails.
    pub fn contains_value(&self, value: &V) -> Result<bool, MapError> {
        let values = self.codec.encode_value(value)?;
        require_columns(&values, "value")?;
        let statement =
            statement::exists_matching(self.data_source.dialect(), &self.table, &values);
        self.data_source.with_statement(&statement.sql, |prepared| {
            first_column_bool(prepared.query_first(&statement.params)?)
        })
    }

    /// Returns true when the table has no rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the query fails.
    pub fn is_empty(&self) -> Result<bool, MapError> {
        let statement = statement::exists_any(&self.table);
        let any = self.data_source.with_statement(&statement.sql, |prepared| {
            first_column_bool(prepared.query_first(&statement.params)?)
        })?;
        Ok(!any)
    }

    /// Returns the number of rows in the table.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the query fails.
    pub fn size(&self) -> Result<u64, MapError> {
        let statement = statement::count_rows(&self.table);
        self.data_source.with_statement(&statement.sql, |prepared| {
            first_column_count(prepared.query_first(&statement.params)?)
        })
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Deletes every row.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when the delete fails.
    pub fn clear(&self) -> Result<(), MapError> {
        let statement = statement::delete_all(&self.table);
        let deleted = self
            .data_source
            .with_statement(&statement.sql, |prepared| prepared.execute(&statement.params))?;
        debug!(table = %self.table, deleted, "cleared table");
        self.emit(&MapEvent::Cleared);
        Ok(())
    }

    /// Stores `value` under `key` inside a locked block and returns the prior value.
    ///
    /// Inserts when no row exists, updates otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when any step fails; the block is rolled back.
    /// Two concurrent `put`s of an absent key may race to insert; the loser
    /// fails with [`MapError::Constraint`].
    pub fn put(&self, key: &K, value: &V) -> Result<Option<V>, MapError> {
        let (keys, values) = self.encode_entry(key, value)?;
        let prior = self.locked("put", &keys, |connection, prior| {
            let dialect = connection.dialect();
            let write = if prior.is_some() {
                statement::update_by_key(dialect, &self.table, &keys, &values)
            } else {
                statement::insert(dialect, &self.table, &keys, &values)
            };
            connection.execute(&write)?;
            Ok(Finish::Commit(prior))
        })?;
        self.emit(&MapEvent::Written {
            key,
            value,
        });
        Ok(prior)
    }

    /// Inserts `value` unless `key` already has a row, returning the existing value.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when any step fails, including
    /// [`MapError::Constraint`] when another caller inserted `key` between the
    /// read and the insert.
    pub fn put_if_absent(&self, key: &K, value: &V) -> Result<Option<V>, MapError> {
        let (keys, values) = self.encode_entry(key, value)?;
        let existing = self.data_source.with_connection(|connection| {
            if let Some(existing) = self.select(connection, &keys, false)? {
                return Ok(Some(existing));
            }
            let write = statement::insert(connection.dialect(), &self.table, &keys, &values);
            connection.execute(&write)?;
            Ok(None)
        })?;
        if existing.is_none() {
            self.emit(&MapEvent::Written {
                key,
                value,
            });
        }
        Ok(existing)
    }

    /// Upserts `value` under `key` in one statement without reading the prior value.
    ///
    /// Returns true when at least one row was affected.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when encoding or the statement fails.
    pub fn fast_put(&self, key: &K, value: &V) -> Result<bool, MapError> {
        let (keys, values) = self.encode_entry(key, value)?;
        let affected = self.data_source.with_connection(|connection| {
            let write = statement::upsert(connection.dialect(), &self.table, &keys, &values);
            connection.execute(&write)
        })?;
        debug!(table = %self.table, affected, "fast put");
        if affected > 0 {
            self.emit(&MapEvent::Written {
                key,
                value,
            });
        }
        Ok(affected > 0)
    }

    /// Upserts every entry over one shared connection, committing entry by entry.
    ///
    /// Listeners hear about committed entries once the connection is released,
    /// including the entries committed before a failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`MapError`]; entries before it stay committed.
    pub fn put_all<'a, I>(&self, entries: I) -> Result<(), MapError>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        let mut written: Vec<(&'a K, &'a V)> = Vec::new();
        let outcome = self.data_source.with_connection(|connection| {
            for (key, value) in entries {
                let (keys, values) = self.encode_entry(key, value)?;
                let write = statement::upsert(connection.dialect(), &self.table, &keys, &values);
                connection.execute(&write)?;
                written.push((key, value));
            }
            Ok(())
        });
        debug!(table = %self.table, written = written.len(), ok = outcome.is_ok(), "put all");
        for (key, value) in written {
            self.emit(&MapEvent::Written {
                key,
                value,
            });
        }
        outcome
    }

    /// Replaces the value of an existing key and returns the prior value.
    ///
    /// An absent key is left absent and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when any step fails; the block is rolled back.
    pub fn replace(&self, key: &K, value: &V) -> Result<Option<V>, MapError> {
        let (keys, values) = self.encode_entry(key, value)?;
        let prior = self.locked("replace", &keys, |connection, prior| {
            if prior.is_none() {
                return Ok(Finish::Rollback(None));
            }
            let write = statement::update_by_key(connection.dialect(), &self.table, &keys, &values);
            connection.execute(&write)?;
            Ok(Finish::Commit(prior))
        })?;
        if prior.is_some() {
            self.emit(&MapEvent::Written {
                key,
                value,
            });
        }
        Ok(prior)
    }

    /// Replaces the value of `key` only if it currently equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when any step fails; the block is rolled back.
    pub fn replace_if_equal(&self, key: &K, expected: &V, value: &V) -> Result<bool, MapError> {
        let (keys, values) = self.encode_entry(key, value)?;
        let replaced = self.locked("replace_if_equal", &keys, |connection, prior| {
            if prior.as_ref() != Some(expected) {
                return Ok(Finish::Rollback(false));
            }
            let write = statement::update_by_key(connection.dialect(), &self.table, &keys, &values);
            let affected = connection.execute(&write)?;
            Ok(Finish::Commit(affected > 0))
        })?;
        if replaced {
            self.emit(&MapEvent::Written {
                key,
                value,
            });
        }
        Ok(replaced)
    }

    /// Deletes `key` and returns its prior value.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when any step fails; the block is rolled back.
    pub fn remove(&self, key: &K) -> Result<Option<V>, MapError> {
        let keys = self.encode_key(key)?;
        let prior = self.locked("remove", &keys, |connection, prior| {
            if prior.is_none() {
                return Ok(Finish::Rollback(None));
            }
            let write = statement::delete_by_key(connection.dialect(), &self.table, &keys);
            connection.execute(&write)?;
            Ok(Finish::Commit(prior))
        })?;
        if prior.is_some() {
            self.emit(&MapEvent::Removed {
                key,
            });
        }
        Ok(prior)
    }

    /// Deletes `key` only if its value currently equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] when any step fails; the block is rolled back.
    pub fn remove_if_equal(&self, key: &K, expected: &V) -> Result<bool, MapError> {
        let keys = self.encode_key(key)?;
        let removed = self.locked("remove_if_equal", &keys, |connection, prior| {
            if prior.as_ref() != Some(expected) {
                return Ok(Finish::Rollback(false));
            }
            let write = statement::delete_by_key(connection.dialect(), &self.table, &keys);
            let affected = connection.execute(&write)?;
            Ok(Finish::Commit(affected > 0))
        })?;
        if removed {
            self.emit(&MapEvent::Removed {
                key,
            });
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Encodes and validates key columns.
    fn encode_key(&self, key: &K) -> Result<ColumnMap, MapError> {
        let keys = self.codec.encode_key(key)?;
        require_columns(&keys, "key")?;
        Ok(keys)
    }

    /// Encodes and validates a key/value pair.
    fn encode_entry(&self, key: &K, value: &V) -> Result<(ColumnMap, ColumnMap), MapError> {
        let keys = self.codec.encode_key(key)?;
        let values = self.codec.encode_value(value)?;
        require_disjoint(&keys, &values)?;
        Ok((keys, values))
    }

    /// Selects and decodes the row for `keys`, optionally locking it.
    fn select(
        &self,
        connection: &mut dyn SqlConnection,
        keys: &ColumnMap,
        for_update: bool,
    ) -> Result<Option<V>, MapError> {
        let query = statement::select_by_key(connection.dialect(), &self.table, keys, for_update);
        let row = connection.query_first(&query)?;
        row.map(|row| self.codec.decode_value(&row)).transpose().map_err(MapError::from)
    }

    /// Runs `body` inside a transaction after locking the row for `keys`.
    fn locked<T>(
        &self,
        op: &'static str,
        keys: &ColumnMap,
        body: impl FnOnce(&mut dyn SqlConnection, Option<V>) -> Result<Finish<T>, MapError>,
    ) -> Result<T, MapError> {
        self.data_source.with_connection(|connection| {
            connection.begin()?;
            let outcome =
                self.select(connection, keys, true).and_then(|prior| body(connection, prior));
            match outcome {
                Ok(Finish::Commit(value)) => {
                    connection.commit()?;
                    debug!(table = %self.table, op, "locked block committed");
                    Ok(value)
                }
                Ok(Finish::Rollback(value)) => {
                    connection.rollback()?;
                    debug!(table = %self.table, op, "locked block released without writes");
                    Ok(value)
                }
                Err(err) => {
                    rollback_quietly(connection);
                    debug!(table = %self.table, op, error = %err, "locked block rolled back");
                    Err(err)
                }
            }
        })
    }

    /// Notifies listeners of a committed change.
    fn emit(&self, event: &MapEvent<'_, K, V>) {
        self.listeners.notify(|listener| listener.deliver(event));
    }
}

impl<K, V, C, D> Monitorable<SharedListener<K, V>> for DurableMap<K, V, C, D> {
    fn add_listener(&self, listener: SharedListener<K, V>) {
        self.listeners.add_listener(listener);
    }

    fn delete_listener(&self, listener: &SharedListener<K, V>) {
        self.listeners.delete_listener(listener);
    }

    fn delete_listeners(&self) {
        self.listeners.delete_listeners();
    }

    fn count_listeners(&self) -> usize {
        self.listeners.count_listeners()
    }
}
