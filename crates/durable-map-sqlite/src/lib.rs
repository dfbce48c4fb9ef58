// crates/durable-map-sqlite/src/lib.rs
// ============================================================================
// Module: Durable Map SQLite Backend
// Description: Embedded DataSource for the durable map using SQLite WAL.
// Purpose: Run durable maps in-process without a database server.
// Dependencies: durable-map-core, rusqlite, serde, tracing
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteDataSource`], a small pool of `SQLite`
//! connections implementing the durable map's
//! [`DataSource`](durable_map_core::DataSource) traits. `SQLite` has no row
//! locks, so a locked block opens with `BEGIN IMMEDIATE` and holds the
//! database write lock until commit or rollback; concurrent writers from the
//! same pool or other processes queue behind it for up to the busy timeout.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use source::SqliteDataSource;
pub use source::SqliteDataSourceConfig;
pub use source::SqliteJournalMode;
pub use source::SqliteSyncMode;
pub use source::classify_sqlite_error;
