//! Row construction for destination inserts and updates.
//!
//! [`RowBuilder`] merges two sources of columns under one precedence rule:
//!
//! 1. Known values supplied by the caller are always included, in the order
//!    they were added, even if the destination would accept a NULL/default.
//! 2. Every required column (NOT NULL, no default) not already supplied gets a
//!    synthesized value: `0` for numeric-family classes, `''` otherwise.
//!
//! The result is an [`InsertSpec`] the destination accepts without a
//! "field doesn't have a default value" failure, whatever extra required
//! columns a later schema version added.

use std::fmt;

use super::schema::RequiredColumn;
use super::value::SqlValue;

/// A single-row insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSpec {
    pub table: String,
    pub columns: Vec<(String, SqlValue)>,
}

impl InsertSpec {
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Replace the value of an existing column. Returns false if absent.
    pub fn set(&mut self, column: &str, value: SqlValue) -> bool {
        match self.columns.iter_mut().find(|(name, _)| name == column) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Display for InsertSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "INSERT INTO {} ({})", self.table, assignments.join(", "))
    }
}

/// A single-table update keyed by one column, or the first row when unkeyed.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    pub table: String,
    pub set: Vec<(String, SqlValue)>,
    /// `WHERE key = value`; `None` updates the first row (`LIMIT 1`).
    pub key: Option<(String, SqlValue)>,
}

impl UpdateSpec {
    pub fn keyed(
        table: impl Into<String>,
        set: Vec<(String, SqlValue)>,
        key: (impl Into<String>, SqlValue),
    ) -> Self {
        Self {
            table: table.into(),
            set,
            key: Some((key.0.into(), key.1)),
        }
    }

    pub fn first_row(table: impl Into<String>, set: Vec<(String, SqlValue)>) -> Self {
        Self {
            table: table.into(),
            set,
            key: None,
        }
    }
}

impl fmt::Display for UpdateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assignments: Vec<String> = self
            .set
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "UPDATE {} SET {}", self.table, assignments.join(", "))?;
        match &self.key {
            Some((column, value)) => write!(f, " WHERE {}={}", column, value),
            None => write!(f, " LIMIT 1"),
        }
    }
}

/// Builds an [`InsertSpec`] from known values plus catalog-required columns.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    table: String,
    known: Vec<(String, SqlValue)>,
}

impl RowBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            known: Vec::new(),
        }
    }

    /// Add a well-known column. A later value for the same column replaces
    /// the earlier one in place.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.known.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.known.push((column, value)),
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Merge with the required columns and emit the insert.
    pub fn build(self, required: &[RequiredColumn]) -> InsertSpec {
        let mut columns = self.known;
        for col in required {
            if columns.iter().any(|(name, _)| name.eq_ignore_ascii_case(&col.name)) {
                continue;
            }
            let value = if col.storage_class.is_numeric() {
                SqlValue::I64(0)
            } else {
                SqlValue::Text(String::new())
            };
            columns.push((col.name.clone(), value));
        }
        InsertSpec {
            table: self.table,
            columns,
        }
    }
}
