// crates/durable-map-postgres/src/lib.rs
// ============================================================================
// Module: Durable Map Postgres Backend
// Description: Pooled Postgres DataSource for the durable map.
// Purpose: Run durable maps against a shared Postgres server with row locks.
// Dependencies: durable-map-core, postgres, postgres-types, r2d2, r2d2_postgres
// ============================================================================

//! ## Overview
//! This crate provides [`PostgresDataSource`], an `r2d2` pool of `postgres`
//! clients implementing the durable map's
//! [`DataSource`](durable_map_core::DataSource) traits. Locked blocks use
//! `SELECT ... FOR UPDATE`, so only writers of the same key wait on each
//! other; the configured statement timeout bounds every wait.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use source::PostgresDataSource;
pub use source::PostgresDataSourceConfig;
pub use source::classify_postgres_error;
