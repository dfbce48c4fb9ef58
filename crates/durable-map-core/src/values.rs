// crates/durable-map-core/src/values.rs
// ============================================================================
// Module: Column Values
// Description: Driver-neutral bind values, ordered column maps, and result rows.
// Purpose: Carry codec output to the data source and result rows back.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Codecs speak in [`ColumnMap`] values on the way in and read [`Row`] values
//! on the way out. Both preserve column order: the order a codec inserts
//! columns is the order placeholders appear in statement text and the order
//! parameters are bound.

// ============================================================================
// SECTION: SqlValue
// ============================================================================

/// Dynamically typed value bound to, or read from, a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// Signed integer (narrowed by backends to the column width).
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Boolean (stored as 0/1 by backends without a boolean type).
    Bool(bool),
}

impl SqlValue {
    /// Returns true for `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the numeric payload as a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Integer widening mirrors SQL numeric affinity.")]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the text payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the blob payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(value) => Some(value.as_slice()),
            _ => None,
        }
    }

    /// Returns a boolean, accepting integer 0/1 for backends without `BOOLEAN`.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        Self::Blob(value.to_vec())
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
// SECTION: ColumnMap
// ============================================================================

/// Ordered column-name to value mapping produced by a codec.
///
/// # Invariants
/// - Column names are unique; re-inserting a name replaces its value in place.
/// - Iteration order is insertion order and is the canonical binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    /// Column entries in binding order.
    entries: Vec<(String, SqlValue)>,
}

impl ColumnMap {
    /// Creates an empty column map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == column) {
            entry.1 = value;
        } else {
            self.entries.push((column, value));
        }
    }

    /// Builder-style [`ColumnMap::insert`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns the value bound to `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    /// Returns true when `column` is present.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Number of columns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no columns are present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Column names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Column values in binding order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// Column entries in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the first column name shared with `other`, if any.
    #[must_use]
    pub fn overlap<'a>(&'a self, other: &Self) -> Option<&'a str> {
        self.names().find(|name| other.contains(name))
    }

    /// Concatenates `self` then `other` into a new map.
    #[must_use]
    pub fn chain(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.insert(name, value.clone());
        }
        merged
    }
}

impl<N: Into<String>, V: Into<SqlValue>> FromIterator<(N, V)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

// ============================================================================
// SECTION: Row
// ============================================================================

/// Owned result row returned by a data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Result columns in select order.
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Builds a row from ordered `(column, value)` pairs.
    #[must_use]
    pub const fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self {
            columns,
        }
    }

    /// Returns the value of the named column (ASCII case-insensitive).
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    /// Returns the value at zero-based `index`.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    /// Number of columns in the row.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true for a row without columns.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in select order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}
