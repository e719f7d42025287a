//! Ordering-number allocation for post tables.
//!
//! GNUBoard lists posts by ascending `wr_num`, so each new post takes a
//! number below every existing one.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::core::traits::TargetStore;
use crate::error::{MigrateError, Result};

/// Ordering-number column of a post table.
pub const ORDERING_COLUMN: &str = "wr_num";

/// Hands out strictly decreasing negative ordering numbers per table.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last: HashMap<String, i64>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ordering number: one below both the table minimum and the last
    /// number handed out for it, `-1` for an empty table.
    ///
    /// A missing table is created from the minimal post schema.
    pub async fn next(&mut self, target: &dyn TargetStore, table: &str) -> Result<i64> {
        let db_min = match target.min_value(table, ORDERING_COLUMN).await {
            Ok(min) => min,
            Err(MigrateError::TableNotFound(_)) => {
                info!("Post table {} is missing, creating it", table);
                target.create_post_table(table).await?;
                None
            }
            Err(e) => return Err(e),
        };

        let floor = match (db_min, self.last.get(table).copied()) {
            (Some(db), Some(last)) => db.min(last),
            (Some(db), None) => db,
            (None, Some(last)) => last,
            (None, None) => 0,
        };
        let next = floor - 1;

        debug!("{}: next {} = {}", table, ORDERING_COLUMN, next);
        self.last.insert(table.to_string(), next);
        Ok(next)
    }

    /// Last number handed out for a table.
    pub fn last(&self, table: &str) -> Option<i64> {
        self.last.get(table).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::TargetStore;
    use crate::testing::FakeTarget;

    #[tokio::test]
    async fn test_empty_table_starts_at_minus_one() {
        let target = FakeTarget::gnuboard();
        target.create_post_table("g5_write_free").await.unwrap();

        let mut seq = SequenceAllocator::new();
        assert_eq!(seq.next(&target, "g5_write_free").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_follows_existing_minimum() {
        let target = FakeTarget::gnuboard();
        target.create_post_table("g5_write_free").await.unwrap();
        target.seed_row("g5_write_free", &[("wr_num", (-41i64).into())]);

        let mut seq = SequenceAllocator::new();
        assert_eq!(seq.next(&target, "g5_write_free").await.unwrap(), -42);
    }

    #[tokio::test]
    async fn test_strictly_decreasing_without_inserts() {
        let target = FakeTarget::gnuboard();
        target.create_post_table("g5_write_free").await.unwrap();

        let mut seq = SequenceAllocator::new();
        let numbers: Vec<i64> = {
            let mut out = Vec::new();
            for _ in 0..4 {
                out.push(seq.next(&target, "g5_write_free").await.unwrap());
            }
            out
        };
        assert_eq!(numbers, vec![-1, -2, -3, -4]);
        assert_eq!(seq.last("g5_write_free"), Some(-4));
    }

    #[tokio::test]
    async fn test_missing_table_is_created() {
        let target = FakeTarget::gnuboard();
        let mut seq = SequenceAllocator::new();

        assert_eq!(seq.next(&target, "g5_write_new").await.unwrap(), -1);
        assert!(target.table_exists("g5_write_new").await.unwrap());
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let target = FakeTarget::gnuboard();
        target.create_post_table("g5_write_a").await.unwrap();
        target.create_post_table("g5_write_b").await.unwrap();

        let mut seq = SequenceAllocator::new();
        seq.next(&target, "g5_write_a").await.unwrap();
        seq.next(&target, "g5_write_a").await.unwrap();
        assert_eq!(seq.next(&target, "g5_write_b").await.unwrap(), -1);
    }
}
