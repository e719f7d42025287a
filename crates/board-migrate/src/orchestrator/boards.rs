//! Per-board pipeline: registry row, post table, posts, menu entry.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::identifier::board_key_for;
use crate::core::row::{RowBuilder, UpdateSpec};
use crate::core::traits::TargetStore;
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::source::{DocumentExtractor, LegacyDocument, LegacyModule};
use crate::transfer::content::{legacy_datetime, rewrite_paths};
use crate::transfer::{
    ensure_post_table, insert_if_absent, OverflowRecoveryInserter, RunContext, UpsertOutcome,
};

use super::Orchestrator;

/// Post body column.
pub const BODY_COLUMN: &str = "wr_content";

/// Optional column recording a post's source `document_srl`.
pub const ORIGIN_COLUMN: &str = "wr_legacy_srl";

const ORIGIN_DEFINITION: &str = "BIGINT NULL";

/// A post whose body was cut to fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncatedBody {
    pub table: String,
    pub document_srl: Option<i64>,
    pub post_id: u64,
    pub original_chars: usize,
    pub stored_chars: usize,
}

/// Board-level names derived from one legacy module.
#[derive(Debug, Clone)]
pub(crate) struct BoardNames {
    pub key: String,
    pub title: String,
    pub board_table: String,
    pub post_table: String,
    pub menu_table: String,
}

impl Orchestrator {
    pub(crate) fn board_names(&self, module: &LegacyModule) -> BoardNames {
        let key = board_key_for(module.mid.as_deref(), module.module_srl);
        BoardNames {
            title: module.display_title(),
            board_table: self.target_table("board"),
            post_table: self.target_table(&format!("write_{}", key)),
            menu_table: self.target_table("menu"),
            key,
        }
    }

    /// Run one board through every state. Returns false if cancelled.
    pub(crate) async fn migrate_board(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        prefix: &str,
        module: &LegacyModule,
        cancel: &CancellationToken,
        truncated: &mut Vec<TruncatedBody>,
    ) -> Result<bool> {
        let names = self.board_names(module);
        info!(
            "Board {} ({}) from module_srl={}",
            names.key, names.title, module.module_srl
        );

        // Discovered -> BoardRegistered
        self.register_board(ctx, target, &names).await?;

        // BoardRegistered -> PostTableReady
        if ensure_post_table(ctx, target, &names.post_table).await? {
            ctx.stats.post_tables_created += 1;
        }
        if self.config.migration.track_post_origin {
            self.ensure_origin_column(ctx, target, &names.post_table)
                .await?;
        }
        let inserter = OverflowRecoveryInserter::new(&names.post_table, BODY_COLUMN);
        inserter.prepare(target).await?;

        // PostTableReady -> PostsStreamed
        let mut extractor = DocumentExtractor::open(
            self.source.as_ref(),
            prefix,
            module.module_srl,
            self.config.migration.effective_batch_size(),
        )
        .await?;
        info!("  -> {} documents", extractor.total());

        while let Some(doc) = extractor.next_live().await? {
            if cancel.is_cancelled() {
                info!("  Cancelled while streaming {}", names.key);
                ctx.stats.documents_deleted += extractor.skipped_deleted();
                return Ok(false);
            }
            self.migrate_post(ctx, target, &inserter, &names, &doc, truncated)
                .await?;
        }
        ctx.stats.documents_deleted += extractor.skipped_deleted();
        if extractor.skipped_deleted() > 0 {
            info!(
                "  -> {} deleted documents skipped",
                extractor.skipped_deleted()
            );
        }

        if self.config.migration.update_board_counts {
            self.refresh_board_count(target, &names).await?;
        }

        // PostsStreamed -> MenuLinked
        self.link_menu(ctx, target, &names).await?;
        Ok(true)
    }

    async fn register_board(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        names: &BoardNames,
    ) -> Result<()> {
        let defaults = &self.config.migration.board_defaults;
        let builder = RowBuilder::new(&names.board_table)
            .value("bo_subject", names.title.as_str())
            .value("bo_content_head", "")
            .value("bo_page_rows", defaults.page_rows)
            .value("bo_mobile_page_rows", defaults.mobile_page_rows)
            .value("bo_skin", defaults.skin.as_str())
            .value("bo_mobile_skin", defaults.mobile_skin.as_str());

        match insert_if_absent(ctx, target, builder, "bo_table", names.key.as_str().into()).await? {
            UpsertOutcome::Created { .. } => {
                ctx.stats.boards_created += 1;
                info!("+ board {} created ({})", names.key, names.title);
            }
            UpsertOutcome::Existing => {
                ctx.stats.boards_existing += 1;
                info!("- board {} exists, skipped", names.key);
            }
        }
        Ok(())
    }

    async fn ensure_origin_column(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        post_table: &str,
    ) -> Result<()> {
        if target.column_info(post_table, ORIGIN_COLUMN).await?.is_some() {
            return Ok(());
        }
        target
            .add_column(post_table, ORIGIN_COLUMN, ORIGIN_DEFINITION)
            .await?;
        ctx.invalidate(post_table);
        Ok(())
    }

    async fn migrate_post(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        inserter: &OverflowRecoveryInserter,
        names: &BoardNames,
        doc: &LegacyDocument,
        truncated: &mut Vec<TruncatedBody>,
    ) -> Result<()> {
        let track_origin = self.config.migration.track_post_origin;
        if let (true, Some(srl)) = (track_origin, doc.document_srl) {
            if target
                .row_exists(&names.post_table, ORIGIN_COLUMN, &SqlValue::I64(srl))
                .await?
            {
                ctx.stats.posts_existing += 1;
                debug!("    - document {} already migrated, skipped", srl);
                return Ok(());
            }
        }

        let wr_num = ctx.sequences.next(target, &names.post_table).await?;
        let body = rewrite_paths(
            doc.content.as_deref().unwrap_or_default(),
            &self.config.migration.path_rewrites,
            &names.key,
        );
        let datetime = doc
            .regdate
            .as_deref()
            .map(legacy_datetime)
            .unwrap_or_default();

        let mut builder = RowBuilder::new(&names.post_table)
            .value("wr_num", wr_num)
            .value("wr_reply", "")
            .value("wr_parent", 0i64)
            .value("wr_is_comment", 0i64)
            .value("wr_comment", 0i64)
            .value("wr_subject", doc.title.clone().unwrap_or_default())
            .value(BODY_COLUMN, body)
            .value("wr_hit", doc.readed_count.unwrap_or(0))
            .value("wr_name", doc.author_name())
            .value("wr_datetime", datetime.as_str())
            .value("wr_last", datetime)
            .value("wr_ip", doc.ipaddress.clone().unwrap_or_default())
            .value("mb_id", doc.user_id.clone().unwrap_or_default());
        if track_origin {
            builder = builder.value(ORIGIN_COLUMN, doc.document_srl);
        }

        let required = ctx.required_columns(target, &names.post_table).await?;
        let post = inserter.insert(target, builder.build(&required)).await?;

        target
            .update(&UpdateSpec::keyed(
                &names.post_table,
                vec![("wr_parent".to_string(), SqlValue::from(post.id))],
                ("wr_id", SqlValue::from(post.id)),
            ))
            .await?;

        ctx.stats.posts_created += 1;
        if let Some(t) = post.truncation {
            ctx.stats.bodies_truncated += 1;
            truncated.push(TruncatedBody {
                table: names.post_table.clone(),
                document_srl: doc.document_srl,
                post_id: post.id,
                original_chars: t.original_chars,
                stored_chars: t.stored_chars,
            });
        }
        info!("    * document {} -> wr_id {}", doc.label(), post.id);
        Ok(())
    }

    async fn refresh_board_count(&self, target: &dyn TargetStore, names: &BoardNames) -> Result<()> {
        if target
            .column_info(&names.board_table, "bo_count_write")
            .await?
            .is_none()
        {
            debug!("{} has no bo_count_write column", names.board_table);
            return Ok(());
        }
        let count = target
            .count_matching(&names.post_table, "wr_is_comment", &SqlValue::I64(0))
            .await?;
        target
            .update(&UpdateSpec::keyed(
                &names.board_table,
                vec![("bo_count_write".to_string(), SqlValue::I64(count))],
                ("bo_table", names.key.as_str().into()),
            ))
            .await?;
        debug!("{}: bo_count_write = {}", names.key, count);
        Ok(())
    }

    async fn link_menu(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        names: &BoardNames,
    ) -> Result<()> {
        let link = format!("./board.php?bo_table={}", names.key);
        let builder = RowBuilder::new(&names.menu_table)
            .value("me_name", names.title.as_str())
            .value("me_link", link.as_str())
            .value("me_target", "_self")
            .value("me_order", ctx.menu_order())
            .value("me_use", 1i64);

        match insert_if_absent(ctx, target, builder, "me_code", names.key.as_str().into()).await? {
            UpsertOutcome::Created { .. } => {
                ctx.advance_menu_order();
                ctx.stats.menus_created += 1;
                info!("+ menu {} -> {}", names.title, link);
            }
            UpsertOutcome::Existing => {
                ctx.stats.menus_existing += 1;
                info!("- menu {} exists, skipped", names.key);
            }
        }
        Ok(())
    }
}
