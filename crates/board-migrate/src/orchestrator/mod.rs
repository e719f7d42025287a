//! Migration orchestrator - main workflow coordinator.
//!
//! One run walks every legacy board through
//! `Discovered -> BoardRegistered -> PostTableReady -> PostsStreamed -> MenuLinked`,
//! then makes one pass over members and one over the site config.

mod accounts;
mod boards;
mod dry_run;

pub use accounts::{member_provenance, unusable_password_hash, SiteConfigAction};
pub use boards::{TruncatedBody, BODY_COLUMN, ORIGIN_COLUMN};
pub use dry_run::DryRunTarget;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::traits::{SourceStore, TargetStore};
use crate::drivers::{MysqlSource, MysqlTarget};
use crate::error::Result;
use crate::source::{detect_prefix, verify_prefix};
use crate::transfer::{EntityStats, RunContext};

/// Source pool size: one streaming cursor plus side queries.
const SOURCE_POOL_SIZE: usize = 4;
/// Target pool size; writes are strictly sequential.
const TARGET_POOL_SIZE: usize = 2;

/// Migration orchestrator.
///
/// Runs are single-writer. Two simultaneous runs against one destination
/// can allocate the same ordering numbers and duplicate posts.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: `completed` or `cancelled`.
    pub status: String,

    /// Whether mutations were only logged.
    pub dry_run: bool,

    /// Detected or configured legacy table prefix.
    pub source_prefix: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Board modules found in the source.
    pub boards_total: usize,

    /// Per-entity counters.
    pub stats: EntityStats,

    /// Posts whose body had to be truncated.
    pub truncated_bodies: Vec<TruncatedBody>,

    /// Site title written to the config singleton.
    pub site_title: Option<String>,

    pub site_config: Option<SiteConfigAction>,

    /// Statements a dry run would have executed, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_mutations: Vec<String>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == "cancelled"
    }
}

/// One board as it would be migrated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardPlan {
    pub module_srl: i64,
    pub mid: Option<String>,
    pub board_key: String,
    pub title: String,
    pub post_table: String,
    /// Documents in the source, deleted ones included.
    pub documents: i64,
    pub board_exists: bool,
    pub post_table_exists: bool,
}

/// Output of [`Orchestrator::detect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub prefix: String,
    pub boards: Vec<BoardPlan>,
}

/// Connectivity of both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Connect to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        let source = MysqlSource::new(&config.source, SOURCE_POOL_SIZE).await?;
        let target = MysqlTarget::new(&config.target, TARGET_POOL_SIZE).await?;
        Ok(Self::with_stores(config, Arc::new(source), Arc::new(target)))
    }

    /// Build an orchestrator over existing stores.
    pub fn with_stores(
        config: Config,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Destination table name with the configured prefix.
    pub(crate) fn target_table(&self, name: &str) -> String {
        format!("{}{}", self.config.target.table_prefix, name)
    }

    /// Configured prefix if set, otherwise detected from the catalog.
    pub async fn resolve_prefix(&self) -> Result<String> {
        let tables = self.source.list_tables().await?;
        match self.config.source.table_prefix.as_deref() {
            Some(prefix) => verify_prefix(&tables, prefix),
            None => detect_prefix(&tables),
        }
    }

    /// Detect the legacy schema and list the boards a run would migrate.
    pub async fn detect(&self) -> Result<DetectionReport> {
        let prefix = self.resolve_prefix().await?;
        let modules = self.source.load_boards(&prefix).await?;

        let mut boards = Vec::with_capacity(modules.len());
        for module in &modules {
            let names = self.board_names(module);
            let documents = self
                .source
                .count_documents(&prefix, module.module_srl)
                .await?;
            let board_exists = self.target.table_exists(&names.board_table).await?
                && self
                    .target
                    .row_exists(&names.board_table, "bo_table", &names.key.as_str().into())
                    .await?;
            let post_table_exists = self.target.table_exists(&names.post_table).await?;
            boards.push(BoardPlan {
                module_srl: module.module_srl,
                mid: module.mid.clone(),
                board_key: names.key,
                title: names.title,
                post_table: names.post_table,
                documents,
                board_exists,
                post_table_exists,
            });
        }

        Ok(DetectionReport { prefix, boards })
    }

    /// Run the migration.
    pub async fn run(&self, cancel: CancellationToken, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Starting migration run: {}{}",
            run_id,
            if dry_run { " [dry-run]" } else { "" }
        );
        let batch = self.config.migration.effective_batch_size();
        info!(
            "Batch size {} (memory limit {} MB)",
            batch,
            self.config.migration.get_memory_limit_mb()
        );

        let planner = dry_run.then(|| Arc::new(DryRunTarget::new(self.target.clone())));
        let target: Arc<dyn TargetStore> = match &planner {
            Some(dry) => dry.clone(),
            None => self.target.clone(),
        };

        // Phase 1: legacy schema discovery
        let prefix = self.resolve_prefix().await?;
        let modules = self.source.load_boards(&prefix).await?;
        if modules.is_empty() {
            warn!("No board modules found in {}modules", prefix);
        } else {
            info!("Found {} boards", modules.len());
        }

        let mut ctx = RunContext::new();
        let mut truncated = Vec::new();
        let mut completed = true;

        // Phase 2: boards
        for module in &modules {
            if cancel.is_cancelled() {
                completed = false;
                break;
            }
            if !self
                .migrate_board(&mut ctx, target.as_ref(), &prefix, module, &cancel, &mut truncated)
                .await?
            {
                completed = false;
                break;
            }
        }

        // Phase 3: members
        if completed && !cancel.is_cancelled() {
            completed = self
                .migrate_members(&mut ctx, target.as_ref(), &prefix, &cancel)
                .await?;
        } else {
            completed = false;
        }

        // Phase 4: site config
        let mut site = None;
        if completed && !cancel.is_cancelled() {
            site = self.migrate_site(&mut ctx, target.as_ref(), &prefix).await?;
        } else {
            completed = false;
        }

        let status = if completed { "completed" } else { "cancelled" };
        let duration = timer.elapsed();
        info!(
            "Migration {} in {:.1}s: {} boards created, {} posts created, {} members created",
            status,
            duration.as_secs_f64(),
            ctx.stats.boards_created,
            ctx.stats.posts_created,
            ctx.stats.members_created
        );

        let (site_title, site_config) = match site {
            Some((title, action)) => (Some(title), Some(action)),
            None => (None, None),
        };
        let planned_mutations = match &planner {
            Some(dry) => dry.planned().await,
            None => Vec::new(),
        };

        Ok(MigrationResult {
            run_id,
            status: status.to_string(),
            dry_run,
            source_prefix: prefix,
            duration_seconds: duration.as_secs_f64(),
            started_at,
            completed_at: Utc::now(),
            boards_total: modules.len(),
            stats: ctx.stats,
            truncated_bodies: truncated,
            site_title,
            site_config,
            planned_mutations,
        })
    }

    /// Connect to each store independently and report.
    pub async fn health_check(config: &Config) -> HealthCheckResult {
        let timer = Instant::now();
        let (source_connected, source_error) =
            match MysqlSource::new(&config.source, 1).await {
                Ok(source) => {
                    source.close().await;
                    (true, None)
                }
                Err(e) => (false, Some(e.to_string())),
            };
        let source_latency_ms = timer.elapsed().as_millis() as u64;

        let timer = Instant::now();
        let (target_connected, target_error) = match MysqlTarget::new(&config.target, 1).await {
            Ok(target) => {
                target.close().await;
                (true, None)
            }
            Err(e) => (false, Some(e.to_string())),
        };
        let target_latency_ms = timer.elapsed().as_millis() as u64;

        HealthCheckResult {
            source_connected,
            source_latency_ms,
            source_error,
            target_connected,
            target_latency_ms,
            target_error,
            healthy: source_connected && target_connected,
        }
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}
