//! Existence-probed writes keyed by natural key.

use tracing::debug;

use crate::core::row::RowBuilder;
use crate::core::traits::{InsertOutcome, TargetStore};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

use super::RunContext;

/// What an idempotent write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { id: u64 },
    Existing,
}

impl UpsertOutcome {
    pub fn created(&self) -> bool {
        matches!(self, UpsertOutcome::Created { .. })
    }
}

/// Insert the row unless one with `key_column = key` already exists.
///
/// The key is added to the row, then required columns the caller did not
/// supply are synthesized.
pub async fn insert_if_absent(
    ctx: &mut RunContext,
    target: &dyn TargetStore,
    builder: RowBuilder,
    key_column: &str,
    key: SqlValue,
) -> Result<UpsertOutcome> {
    let table = builder.table().to_string();
    insert_if_absent_with(ctx, target, &table, key_column, key, || Ok(builder)).await
}

/// Like [`insert_if_absent`], but the row is only built once the probe has
/// found no existing row.
pub async fn insert_if_absent_with<F>(
    ctx: &mut RunContext,
    target: &dyn TargetStore,
    table: &str,
    key_column: &str,
    key: SqlValue,
    build: F,
) -> Result<UpsertOutcome>
where
    F: FnOnce() -> Result<RowBuilder> + Send,
{
    if target.row_exists(table, key_column, &key).await? {
        debug!("{}: {}={} exists", table, key_column, key);
        return Ok(UpsertOutcome::Existing);
    }

    let required = ctx.required_columns(target, table).await?;
    let spec = build()?.value(key_column, key).build(&required);

    match target.insert(&spec).await? {
        InsertOutcome::Inserted { id } => Ok(UpsertOutcome::Created { id }),
        InsertOutcome::PayloadTooLarge { column } => {
            let column = column.unwrap_or_else(|| "(unknown)".to_string());
            let length = spec
                .value(&column)
                .and_then(SqlValue::as_text)
                .map(|s| s.chars().count())
                .unwrap_or(0);
            Err(MigrateError::PayloadTooLarge {
                table: table.to_string(),
                column,
                length,
                max_length: 0,
            })
        }
    }
}

/// Create the post table from the minimal schema if it is missing.
///
/// Returns true if the table was created.
pub async fn ensure_post_table(
    ctx: &mut RunContext,
    target: &dyn TargetStore,
    table: &str,
) -> Result<bool> {
    if target.table_exists(table).await? {
        return Ok(false);
    }
    target.create_post_table(table).await?;
    ctx.invalidate(table);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTarget;

    #[tokio::test]
    async fn test_second_insert_is_skipped() {
        let target = FakeTarget::gnuboard();
        let mut ctx = RunContext::new();

        let first = insert_if_absent(
            &mut ctx,
            &target,
            RowBuilder::new("g5_menu").value("me_name", "Free"),
            "me_code",
            "free".into(),
        )
        .await
        .unwrap();
        assert!(first.created());

        let second = insert_if_absent(
            &mut ctx,
            &target,
            RowBuilder::new("g5_menu").value("me_name", "Free again"),
            "me_code",
            "free".into(),
        )
        .await
        .unwrap();
        assert_eq!(second, UpsertOutcome::Existing);
        assert_eq!(target.rows("g5_menu").len(), 1);
    }

    #[tokio::test]
    async fn test_required_columns_are_synthesized() {
        let target = FakeTarget::gnuboard();
        let mut ctx = RunContext::new();

        insert_if_absent(
            &mut ctx,
            &target,
            RowBuilder::new("g5_board").value("bo_subject", "Free"),
            "bo_table",
            "free".into(),
        )
        .await
        .unwrap();

        let row = &target.rows("g5_board")[0];
        assert_eq!(row.value("bo_notice"), Some(&SqlValue::Text(String::new())));
        assert_eq!(row.value("bo_list_level"), Some(&SqlValue::I64(0)));
    }

    #[tokio::test]
    async fn test_required_columns_are_cached() {
        let target = FakeTarget::gnuboard();
        let mut ctx = RunContext::new();

        for key in ["a", "b", "c"] {
            insert_if_absent(
                &mut ctx,
                &target,
                RowBuilder::new("g5_menu"),
                "me_code",
                key.into(),
            )
            .await
            .unwrap();
        }
        assert_eq!(target.introspections("g5_menu"), 1);
    }

    #[tokio::test]
    async fn test_builder_not_called_for_existing_rows() {
        let target = FakeTarget::gnuboard();
        target.seed_row("g5_member", &[("mb_id", "admin".into())]);
        let mut ctx = RunContext::new();

        let outcome = insert_if_absent_with(
            &mut ctx,
            &target,
            "g5_member",
            "mb_id",
            "admin".into(),
            || panic!("row built for an existing member"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, UpsertOutcome::Existing);
    }

    #[tokio::test]
    async fn test_ensure_post_table() {
        let target = FakeTarget::gnuboard();
        let mut ctx = RunContext::new();

        assert!(ensure_post_table(&mut ctx, &target, "g5_write_free").await.unwrap());
        assert!(!ensure_post_table(&mut ctx, &target, "g5_write_free").await.unwrap());
    }
}
