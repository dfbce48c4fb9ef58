// crates/durable-map-core/src/error.rs
// ============================================================================
// Module: Durable Map Errors
// Description: Failure taxonomy surfaced by map operations and data sources.
// Purpose: Give callers stable error kinds independent of the SQL driver.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every map operation either returns a value consistent with committed state
//! or fails with one [`MapError`] kind. Backends translate driver failures into
//! these kinds; the map itself never retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by codecs while projecting domain values onto columns.
///
/// # Invariants
/// - Messages describe the offending column or shape, never bound values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    /// Creates a codec error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Builds the error reported when a decoded row lacks a column.
    #[must_use]
    pub fn missing_column(column: &str) -> Self {
        Self(format!("missing column: {column}"))
    }

    /// Builds the error reported when a column holds an unexpected type.
    #[must_use]
    pub fn unexpected_type(column: &str, expected: &str) -> Self {
        Self(format!("column {column} is not {expected}"))
    }
}

/// Durable map errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - A failed operation has left durable state unchanged (except `put_all`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Connection loss, deadlock victim, lock wait or statement timeout.
    #[error("durable map transient failure: {0}")]
    Transient(String),
    /// Unique, foreign-key or check constraint violation.
    #[error("durable map constraint violation: {0}")]
    Constraint(String),
    /// Codec failed to encode or decode.
    #[error("durable map codec failure: {0}")]
    Codec(String),
    /// Caller or codec misuse (empty mapping, overlapping columns, bad schema).
    #[error("durable map programming error: {0}")]
    Programming(String),
    /// Any other database failure.
    #[error("durable map database error: {0}")]
    Database(String),
    /// Invalid data source configuration.
    #[error("durable map invalid config: {0}")]
    Config(String),
}

impl MapError {
    /// Returns true when a caller may reasonably retry the operation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true for unique/foreign-key/check violations.
    #[must_use]
    pub const fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

impl From<CodecError> for MapError {
    fn from(error: CodecError) -> Self {
        Self::Codec(error.0)
    }
}
