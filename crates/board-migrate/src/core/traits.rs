//! Core traits for the two stores the migration talks to.
//!
//! - [`SourceStore`]: reads the legacy board schema (catalog, modules,
//!   documents, members, site)
//! - [`TargetStore`]: introspects and writes the destination forum schema
//!
//! The orchestrator only ever holds `Arc<dyn SourceStore>` and
//! `Arc<dyn TargetStore>`, so tests run the whole migration against in-memory
//! fakes and dry-run mode is a decorator around the real target.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::source::types::{LegacyDocument, LegacyMember, LegacyModule, LegacySite};

use super::row::{InsertSpec, UpdateSpec};
use super::schema::{ColumnInfo, RequiredColumn};
use super::value::SqlValue;

/// Result of a single-row insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row written; `id` is the generated identity (0 when the table has none).
    Inserted { id: u64 },

    /// The store rejected a value as too long for its column.
    PayloadTooLarge { column: Option<String> },
}

/// Read access to the legacy board schema.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// All table names visible in the source database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Board modules (`<prefix>modules` rows with `module = 'board'`).
    async fn load_boards(&self, prefix: &str) -> Result<Vec<LegacyModule>>;

    /// Number of documents attached to one module, for progress reporting.
    async fn count_documents(&self, prefix: &str, module_srl: i64) -> Result<i64>;

    /// Stream one module's documents ordered by `regdate` ascending.
    ///
    /// Rows are pulled from a server-side cursor by a background task and
    /// delivered through a channel holding at most `buffer` rows, so memory
    /// stays bounded whatever the row count. The cursor's connection is
    /// released when the stream ends or the receiver is dropped.
    fn stream_documents(
        &self,
        prefix: &str,
        module_srl: i64,
        buffer: usize,
    ) -> mpsc::Receiver<Result<LegacyDocument>>;

    /// One page of member accounts ordered by `member_srl`.
    async fn load_members(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LegacyMember>>;

    /// The first row of `<prefix>sites`, if any.
    async fn load_site(&self, prefix: &str) -> Result<Option<LegacySite>>;

    /// Database type identifier (e.g. "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Introspection and write access to the destination forum schema.
///
/// Methods that mutate are grouped at the end; [`crate::orchestrator::DryRunTarget`]
/// replaces exactly those with log lines.
#[async_trait]
pub trait TargetStore: Send + Sync {
    // ===== Introspection =====

    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Columns declared NOT NULL with no default, excluding auto-increment
    /// and generated columns, in ordinal order.
    async fn required_columns(&self, table: &str) -> Result<Vec<RequiredColumn>>;

    /// Storage class and maximum length of one column, `None` if absent.
    async fn column_info(&self, table: &str, column: &str) -> Result<Option<ColumnInfo>>;

    // ===== Reads =====

    /// Existence probe by natural key.
    async fn row_exists(&self, table: &str, column: &str, value: &SqlValue) -> Result<bool>;

    /// True if the table holds at least one row.
    async fn has_rows(&self, table: &str) -> Result<bool>;

    /// Rows where `column = value`.
    async fn count_matching(&self, table: &str, column: &str, value: &SqlValue) -> Result<i64>;

    /// `MIN(column)`; `None` on an empty table.
    ///
    /// Fails with [`crate::MigrateError::TableNotFound`] if the table is missing.
    async fn min_value(&self, table: &str, column: &str) -> Result<Option<i64>>;

    // ===== Writes =====

    /// Insert one row.
    async fn insert(&self, spec: &InsertSpec) -> Result<InsertOutcome>;

    /// Apply an update; returns affected rows.
    async fn update(&self, spec: &UpdateSpec) -> Result<u64>;

    /// Create a per-board post table from the fixed minimal schema.
    async fn create_post_table(&self, table: &str) -> Result<()>;

    /// Change a text column to the largest text class, keeping NOT NULL.
    async fn widen_text_column(&self, table: &str, column: &str) -> Result<()>;

    /// Add a column with the given SQL type definition.
    async fn add_column(&self, table: &str, column: &str, definition: &str) -> Result<()>;

    /// Database type identifier (e.g. "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
