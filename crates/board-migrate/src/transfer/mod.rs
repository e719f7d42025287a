//! Entity transfer building blocks.
//!
//! - [`upsert`]: existence-probed inserts keyed by natural key
//! - [`sequence`]: negative ordering-number allocation for post tables
//! - [`overflow`]: widen-then-truncate recovery for oversized post bodies
//! - [`content`]: path rewriting and timestamp conversion
//!
//! All per-run mutable state lives in [`RunContext`], which the orchestrator
//! threads through every call.

pub mod content;
pub mod overflow;
pub mod sequence;
pub mod upsert;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::schema::RequiredColumn;
use crate::core::traits::TargetStore;
use crate::error::Result;

pub use overflow::{OverflowRecoveryInserter, PostInsert, Truncation};
pub use sequence::SequenceAllocator;
pub use upsert::{ensure_post_table, insert_if_absent, insert_if_absent_with, UpsertOutcome};

/// Per-entity counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub boards_created: u64,
    pub boards_existing: u64,
    pub post_tables_created: u64,
    pub posts_created: u64,
    /// Posts skipped because their origin was already recorded.
    pub posts_existing: u64,
    pub documents_deleted: u64,
    pub bodies_truncated: u64,
    pub menus_created: u64,
    pub menus_existing: u64,
    pub members_created: u64,
    pub members_existing: u64,
    /// Source members without an account name.
    pub members_invalid: u64,
}

/// Mutable state shared by every step of one run.
#[derive(Debug)]
pub struct RunContext {
    required: HashMap<String, Vec<RequiredColumn>>,
    pub sequences: SequenceAllocator,
    menu_order: i64,
    pub stats: EntityStats,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            required: HashMap::new(),
            sequences: SequenceAllocator::new(),
            menu_order: 1,
            stats: EntityStats::default(),
        }
    }

    /// Required columns of a table, introspected once per run.
    pub async fn required_columns(
        &mut self,
        target: &dyn TargetStore,
        table: &str,
    ) -> Result<Vec<RequiredColumn>> {
        if let Some(cached) = self.required.get(table) {
            return Ok(cached.clone());
        }
        let columns = target.required_columns(table).await?;
        debug!(
            "{} required columns: [{}]",
            table,
            columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.required.insert(table.to_string(), columns.clone());
        Ok(columns)
    }

    /// Forget cached metadata after a schema change.
    pub fn invalidate(&mut self, table: &str) {
        self.required.remove(table);
    }

    /// Ordering value the next inserted menu entry takes.
    pub fn menu_order(&self) -> i64 {
        self.menu_order
    }

    /// Advance the menu ordering after an entry was actually inserted.
    pub fn advance_menu_order(&mut self) {
        self.menu_order += 1;
    }
}
