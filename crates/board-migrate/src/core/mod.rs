//! Core abstractions for the migration engine.
//!
//! - [`schema`]: destination column metadata (storage classes, capacities)
//! - [`value`]: bound parameter values
//! - [`row`]: insert/update specifications and the default-value synthesizer
//! - [`traits`]: the source and target store interfaces
//! - [`identifier`]: identifier quoting and board-key derivation

pub mod identifier;
pub mod row;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use identifier::{board_key_for, quote_mysql, sanitize_board_key};
pub use row::{InsertSpec, RowBuilder, UpdateSpec};
pub use schema::{ColumnInfo, RequiredColumn, StorageClass};
pub use traits::{InsertOutcome, SourceStore, TargetStore};
pub use value::SqlValue;
