// crates/durable-map-core/src/lib.rs
// ============================================================================
// Module: Durable Map Core
// Description: Driver-agnostic durable concurrent key/value map.
// Purpose: Persist map entries as table rows with transactional updates.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! This crate provides [`DurableMap`], a shared map whose entries live in a
//! relational table. A [`Codec`] pivots keys and values onto named columns, a
//! [`DataSource`] lends pooled connections, and read-modify-write operations
//! run under row locks so concurrent callers get compare-and-swap semantics
//! per key. Backends live in sibling crates (`durable-map-sqlite`,
//! `durable-map-postgres`); any other driver can implement the
//! [`datasource`] traits.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod datasource;
pub mod error;
pub mod events;
pub mod map;
pub mod statement;
pub mod values;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use codec::Codec;
pub use datasource::DataSource;
pub use datasource::SqlConnection;
pub use datasource::SqlStatement;
pub use error::CodecError;
pub use error::MapError;
pub use events::ListenerRegistry;
pub use events::MapEvent;
pub use events::MapListener;
pub use events::Monitorable;
pub use events::SharedListener;
pub use map::DurableMap;
pub use statement::BoundStatement;
pub use statement::SqlDialect;
pub use values::ColumnMap;
pub use values::Row;
pub use values::SqlValue;
