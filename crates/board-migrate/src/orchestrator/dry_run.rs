//! Dry-run decorator for the destination store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::row::{InsertSpec, UpdateSpec};
use crate::core::schema::{ColumnInfo, RequiredColumn};
use crate::core::traits::{InsertOutcome, TargetStore};
use crate::core::value::SqlValue;
use crate::error::Result;

/// Columns of a freshly created post table, as `(name, data_type, max_length)`.
///
/// Mirrors the minimal post-table DDL so planned tables introspect the way
/// the real table would right after creation.
const MINIMAL_POST_COLUMNS: &[(&str, &str, Option<u64>)] = &[
    ("wr_id", "int", None),
    ("wr_num", "int", None),
    ("wr_reply", "varchar", Some(255)),
    ("wr_parent", "int", None),
    ("wr_is_comment", "tinyint", None),
    ("wr_comment", "int", None),
    ("wr_subject", "varchar", Some(255)),
    ("wr_content", "text", Some(65_535)),
    ("wr_hit", "int", None),
    ("wr_name", "varchar", Some(255)),
    ("wr_password", "varchar", Some(255)),
    ("wr_email", "varchar", Some(255)),
    ("wr_homepage", "varchar", Some(255)),
    ("wr_datetime", "varchar", Some(25)),
    ("wr_last", "varchar", Some(25)),
    ("wr_ip", "varchar", Some(40)),
    ("mb_id", "varchar", Some(20)),
];

const LONGTEXT_MAX: u64 = 4_294_967_295;

/// Wraps a real target: reads and introspection pass through, every
/// mutation becomes a `[dry-run]` log line and an entry in [`planned`].
///
/// Tables and columns the run would have created or altered are remembered
/// so later reads against them behave as the real schema would.
///
/// [`planned`]: DryRunTarget::planned
pub struct DryRunTarget {
    inner: Arc<dyn TargetStore>,
    planned_tables: Mutex<HashSet<String>>,
    planned_columns: Mutex<HashSet<(String, String)>>,
    widened_columns: Mutex<HashSet<(String, String)>>,
    statements: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl DryRunTarget {
    pub fn new(inner: Arc<dyn TargetStore>) -> Self {
        Self {
            inner,
            planned_tables: Mutex::new(HashSet::new()),
            planned_columns: Mutex::new(HashSet::new()),
            widened_columns: Mutex::new(HashSet::new()),
            statements: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Every mutation the run would have executed, in order.
    pub async fn planned(&self) -> Vec<String> {
        self.statements.lock().await.clone()
    }

    async fn plan(&self, statement: String) {
        info!("[dry-run] {}", statement);
        self.statements.lock().await.push(statement);
    }

    async fn is_planned(&self, table: &str) -> bool {
        self.planned_tables.lock().await.contains(table)
    }

    async fn is_planned_column(&self, table: &str, column: &str) -> bool {
        self.planned_columns
            .lock()
            .await
            .contains(&(table.to_string(), column.to_string()))
    }

    async fn is_widened(&self, table: &str, column: &str) -> bool {
        self.widened_columns
            .lock()
            .await
            .contains(&(table.to_string(), column.to_string()))
    }
}

#[async_trait]
impl TargetStore for DryRunTarget {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        if self.is_planned(table).await {
            return Ok(true);
        }
        self.inner.table_exists(table).await
    }

    async fn required_columns(&self, table: &str) -> Result<Vec<RequiredColumn>> {
        if self.is_planned(table).await {
            return Ok(Vec::new());
        }
        self.inner.required_columns(table).await
    }

    async fn column_info(&self, table: &str, column: &str) -> Result<Option<ColumnInfo>> {
        if self.is_widened(table, column).await {
            return Ok(Some(ColumnInfo::new("longtext", Some(LONGTEXT_MAX))));
        }
        if self.is_planned_column(table, column).await {
            return Ok(Some(ColumnInfo::new("bigint", None)));
        }
        if self.is_planned(table).await {
            return Ok(MINIMAL_POST_COLUMNS
                .iter()
                .find(|(name, _, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, data_type, max_length)| ColumnInfo::new(*data_type, *max_length)));
        }
        self.inner.column_info(table, column).await
    }

    async fn row_exists(&self, table: &str, column: &str, value: &SqlValue) -> Result<bool> {
        if self.is_planned(table).await || self.is_planned_column(table, column).await {
            return Ok(false);
        }
        self.inner.row_exists(table, column, value).await
    }

    async fn has_rows(&self, table: &str) -> Result<bool> {
        if self.is_planned(table).await {
            return Ok(false);
        }
        self.inner.has_rows(table).await
    }

    async fn count_matching(&self, table: &str, column: &str, value: &SqlValue) -> Result<i64> {
        if self.is_planned(table).await {
            return Ok(0);
        }
        self.inner.count_matching(table, column, value).await
    }

    async fn min_value(&self, table: &str, column: &str) -> Result<Option<i64>> {
        if self.is_planned(table).await {
            return Ok(None);
        }
        self.inner.min_value(table, column).await
    }

    async fn insert(&self, spec: &InsertSpec) -> Result<InsertOutcome> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.plan(spec.to_string()).await;
        Ok(InsertOutcome::Inserted { id })
    }

    async fn update(&self, spec: &UpdateSpec) -> Result<u64> {
        self.plan(spec.to_string()).await;
        Ok(0)
    }

    async fn create_post_table(&self, table: &str) -> Result<()> {
        self.plan(format!("CREATE TABLE {} (minimal post schema)", table))
            .await;
        self.planned_tables.lock().await.insert(table.to_string());
        Ok(())
    }

    async fn widen_text_column(&self, table: &str, column: &str) -> Result<()> {
        self.plan(format!("ALTER TABLE {} MODIFY {} LONGTEXT NOT NULL", table, column))
            .await;
        self.widened_columns
            .lock()
            .await
            .insert((table.to_string(), column.to_string()));
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str, definition: &str) -> Result<()> {
        self.plan(format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))
            .await;
        self.planned_columns
            .lock()
            .await
            .insert((table.to_string(), column.to_string()));
        Ok(())
    }

    fn db_type(&self) -> &str {
        self.inner.db_type()
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
