// crates/durable-map-core/src/codec.rs
// ============================================================================
// Module: Codec
// Description: Projection between domain key/value types and table columns.
// Purpose: Let callers pivot structured keys and values onto named columns.
// Dependencies: crate::values, crate::error
// ============================================================================

//! ## Overview
//! A [`Codec`] encodes keys and values separately: key columns form the
//! table's unique constraint, value columns carry the payload, and the two
//! sets never overlap. The same codec instance is shared by every map
//! operation on every thread.
//!
//! Invariants:
//! - `encode_key` yields the same column names, in the same order, for every key.
//! - `encode_value` yields the same column names, in the same order, for every value.
//! - `decode_value` reads value columns by name from a full table row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::error::CodecError;
use crate::values::ColumnMap;
use crate::values::Row;

// ============================================================================
// SECTION: Codec Trait
// ============================================================================

/// Bidirectional, schema-stable projection of `K`/`V` onto table columns.
pub trait Codec<K, V>: Send + Sync {
    /// Encodes a key into its key columns.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the key cannot be represented.
    fn encode_key(&self, key: &K) -> Result<ColumnMap, CodecError>;

    /// Encodes a value into its value columns.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the value cannot be represented.
    fn encode_value(&self, value: &V) -> Result<ColumnMap, CodecError>;

    /// Reconstructs a value from a selected row.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when required columns are missing or mistyped.
    fn decode_value(&self, row: &Row) -> Result<V, CodecError>;
}

impl<K, V, C: Codec<K, V> + ?Sized> Codec<K, V> for Arc<C> {
    fn encode_key(&self, key: &K) -> Result<ColumnMap, CodecError> {
        (**self).encode_key(key)
    }

    fn encode_value(&self, value: &V) -> Result<ColumnMap, CodecError> {
        (**self).encode_value(value)
    }

    fn decode_value(&self, row: &Row) -> Result<V, CodecError> {
        (**self).decode_value(row)
    }
}
