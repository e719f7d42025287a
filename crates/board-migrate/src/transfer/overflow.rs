//! Oversized post-body recovery.
//!
//! Before the first insert into a board the body column is widened to
//! LONGTEXT when it is narrower. If a body still does not fit, it is cut to
//! the column capacity minus [`TRUNCATION_HEADROOM`], a provenance note is
//! appended, and the insert is retried exactly once.

use tracing::{debug, info, warn};

use crate::core::row::InsertSpec;
use crate::core::schema::ColumnInfo;
use crate::core::traits::{InsertOutcome, TargetStore};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// Capacity left free for the provenance note.
pub const TRUNCATION_HEADROOM: u64 = 200;

/// Lengths recorded when a body had to be cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    /// Original length in characters.
    pub original_chars: usize,
    /// Stored length in characters, provenance note included.
    pub stored_chars: usize,
}

/// A post row that made it into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostInsert {
    pub id: u64,
    pub truncation: Option<Truncation>,
}

/// Widen-then-truncate inserter for one post table's body column.
#[derive(Debug, Clone)]
pub struct OverflowRecoveryInserter {
    table: String,
    column: String,
}

impl OverflowRecoveryInserter {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Widen the body column to LONGTEXT if it is a narrower text class.
    ///
    /// Returns true if the column was widened. A failed ALTER is logged and
    /// the run goes on with the column as it is.
    pub async fn prepare(&self, target: &dyn TargetStore) -> Result<bool> {
        let Some(info) = target.column_info(&self.table, &self.column).await? else {
            debug!("{}.{} not found, nothing to widen", self.table, self.column);
            return Ok(false);
        };

        if !info.storage_class.is_narrow_text() {
            return Ok(false);
        }

        match target.widen_text_column(&self.table, &self.column).await {
            Ok(()) => {
                info!(
                    "Widened {}.{} from {} to LONGTEXT",
                    self.table, self.column, info.data_type
                );
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Could not widen {}.{} ({}), oversized bodies will be truncated: {}",
                    self.table, self.column, info.data_type, e
                );
                Ok(false)
            }
        }
    }

    /// Insert one post, truncating the body and retrying once on overflow.
    pub async fn insert(&self, target: &dyn TargetStore, mut spec: InsertSpec) -> Result<PostInsert> {
        let column = match target.insert(&spec).await? {
            InsertOutcome::Inserted { id } => {
                return Ok(PostInsert {
                    id,
                    truncation: None,
                })
            }
            InsertOutcome::PayloadTooLarge { column } => column,
        };

        if let Some(other) = column.filter(|c| !c.eq_ignore_ascii_case(&self.column)) {
            return Err(overflow_error(&spec, &other, None));
        }

        let body = spec
            .value(&self.column)
            .and_then(SqlValue::as_text)
            .unwrap_or_default()
            .to_string();
        let info = target.column_info(&self.table, &self.column).await?;
        let max_length = info.as_ref().and_then(|i| i.max_length);

        let Some(truncated) = info
            .as_ref()
            .and_then(|i| truncate_with_provenance(&body, i))
        else {
            return Err(overflow_error(&spec, &self.column, max_length));
        };

        let truncation = Truncation {
            original_chars: body.chars().count(),
            stored_chars: truncated.chars().count(),
        };
        spec.set(&self.column, SqlValue::Text(truncated));

        match target.insert(&spec).await? {
            InsertOutcome::Inserted { id } => {
                info!(
                    "    ! {}.{} truncated from {} to {} characters",
                    self.table, self.column, truncation.original_chars, truncation.stored_chars
                );
                Ok(PostInsert {
                    id,
                    truncation: Some(truncation),
                })
            }
            InsertOutcome::PayloadTooLarge { column } => {
                let column = column.unwrap_or_else(|| self.column.clone());
                Err(overflow_error(&spec, &column, max_length))
            }
        }
    }
}

/// Cut `body` to the column capacity minus [`TRUNCATION_HEADROOM`] and
/// append the provenance note.
///
/// `None` when the capacity is unknown or the body already fits, which
/// means truncation cannot help.
pub fn truncate_with_provenance(body: &str, info: &ColumnInfo) -> Option<String> {
    let max = info.max_length.filter(|m| *m > 0)?;
    if info.measure(body) as u64 <= max {
        return None;
    }

    let budget = usize::try_from(max.saturating_sub(TRUNCATION_HEADROOM)).unwrap_or(usize::MAX);
    let head = if info.storage_class.is_byte_limited() {
        let mut end = budget.min(body.len());
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        &body[..end]
    } else {
        match body.char_indices().nth(budget) {
            Some((end, _)) => &body[..end],
            None => body,
        }
    };

    Some(format!(
        "{}\n\n[truncated during migration: original length {} characters]",
        head,
        body.chars().count()
    ))
}

fn overflow_error(spec: &InsertSpec, column: &str, max_length: Option<u64>) -> MigrateError {
    let length = spec
        .value(column)
        .and_then(SqlValue::as_text)
        .map(|s| s.chars().count())
        .unwrap_or(0);
    MigrateError::PayloadTooLarge {
        table: spec.table.clone(),
        column: column.to_string(),
        length,
        max_length: max_length.unwrap_or(0),
    }
}
