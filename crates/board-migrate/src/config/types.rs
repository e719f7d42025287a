//! Configuration type definitions with auto-tuning based on system resources.

use std::fmt;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// Rough upper bound of one legacy document held in memory, used to turn a
/// memory ceiling into a row budget.
pub const ESTIMATED_DOCUMENT_BYTES: u64 = 64 * 1024;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in bytes.
    pub total_memory_bytes: u64,
    /// Total RAM in GB.
    pub total_memory_gb: f64,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let total_memory_bytes = sys.total_memory();
        let total_memory_gb = total_memory_bytes as f64 / (1024.0 * 1024.0 * 1024.0);

        Self {
            total_memory_bytes,
            total_memory_gb,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!("System resources: {:.1} GB RAM", self.total_memory_gb);
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Legacy (Rhymix/XE) database configuration.
    pub source: SourceConfig,

    /// GNUBoard database configuration.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.migration = self.migration.with_auto_tuning(&resources);
        self
    }
}

/// Legacy source database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Legacy table prefix such as `xe_`. Detected from the catalog when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_prefix: Option<String>,

    /// SSL mode: disable, prefer, require (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("table_prefix", &self.table_prefix)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// GNUBoard target database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// GNUBoard table prefix (default: "g5_").
    #[serde(default = "default_g5_prefix")]
    pub table_prefix: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("table_prefix", &self.table_prefix)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Settings applied to newly registered boards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDefaults {
    #[serde(default = "default_page_rows")]
    pub page_rows: i64,

    #[serde(default = "default_mobile_page_rows")]
    pub mobile_page_rows: i64,

    #[serde(default = "default_skin")]
    pub skin: String,

    #[serde(default = "default_skin")]
    pub mobile_skin: String,
}

impl Default for BoardDefaults {
    fn default() -> Self {
        Self {
            page_rows: default_page_rows(),
            mobile_page_rows: default_mobile_page_rows(),
            skin: default_skin(),
            mobile_skin: default_skin(),
        }
    }
}

/// A literal substring replacement applied to post bodies.
///
/// `{board}` in `to` is replaced with the board key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per member page and per progress report. Auto-tuned if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Memory ceiling hint in MB. Auto-tuned based on RAM if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u64>,

    /// Record each post's legacy document id and skip it on re-runs.
    #[serde(default)]
    pub track_post_origin: bool,

    /// Refresh the board registry's post counter after streaming (default: true).
    #[serde(default = "default_true")]
    pub update_board_counts: bool,

    /// Settings for boards created by the migration.
    #[serde(default)]
    pub board_defaults: BoardDefaults,

    /// Body rewrites for legacy storage paths.
    #[serde(default = "default_path_rewrites")]
    pub path_rewrites: Vec<PathRewrite>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            memory_limit_mb: None,
            track_post_origin: false,
            update_board_counts: true,
            board_defaults: BoardDefaults::default(),
            path_rewrites: default_path_rewrites(),
        }
    }
}

impl MigrationConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // 1/8 of RAM, between 64 MB and 1 GB
        if self.memory_limit_mb.is_none() {
            let total_mb = resources.total_memory_bytes / (1024 * 1024);
            self.memory_limit_mb = Some((total_mb / 8).clamp(64, 1024));
        }

        if self.batch_size.is_none() {
            self.batch_size = Some(DEFAULT_BATCH_SIZE);
        }

        info!(
            "Auto-tuned config: batch_size={}, memory_limit_mb={}, effective_batch_size={}",
            self.get_batch_size(),
            self.get_memory_limit_mb(),
            self.effective_batch_size(),
        );

        self
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn get_memory_limit_mb(&self) -> u64 {
        self.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB)
    }

    /// Batch size clamped so that one batch of documents fits the memory ceiling.
    pub fn effective_batch_size(&self) -> usize {
        let budget_bytes = self.get_memory_limit_mb().saturating_mul(1024 * 1024);
        let budget_rows = budget_bytes / ESTIMATED_DOCUMENT_BYTES;
        let budget_rows = usize::try_from(budget_rows).unwrap_or(usize::MAX);
        self.get_batch_size().min(budget_rows).max(1)
    }
}

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;

// Default value functions for serde
fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_g5_prefix() -> String {
    "g5_".to_string()
}

fn default_page_rows() -> i64 {
    20
}

fn default_mobile_page_rows() -> i64 {
    15
}

fn default_skin() -> String {
    "basic".to_string()
}

fn default_true() -> bool {
    true
}

fn default_path_rewrites() -> Vec<PathRewrite> {
    vec![PathRewrite {
        from: "/storage/app/public/".to_string(),
        to: "/data/file/{board}/".to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources(gb: u64) -> SystemResources {
        SystemResources {
            total_memory_bytes: gb * 1024 * 1024 * 1024,
            total_memory_gb: gb as f64,
        }
    }

    #[test]
    fn test_auto_tuning_fills_unset_values() {
        let tuned = MigrationConfig::default().with_auto_tuning(&resources(16));
        assert_eq!(tuned.batch_size, Some(500));
        assert_eq!(tuned.memory_limit_mb, Some(1024));
    }

    #[test]
    fn test_auto_tuning_keeps_explicit_values() {
        let config = MigrationConfig {
            batch_size: Some(50),
            memory_limit_mb: Some(128),
            ..Default::default()
        };
        let tuned = config.with_auto_tuning(&resources(64));
        assert_eq!(tuned.batch_size, Some(50));
        assert_eq!(tuned.memory_limit_mb, Some(128));
    }

    #[test]
    fn test_small_machine_gets_floor_memory_limit() {
        let tuned = MigrationConfig::default().with_auto_tuning(&resources(0));
        assert_eq!(tuned.memory_limit_mb, Some(64));
    }

    #[test]
    fn test_effective_batch_size_respects_memory_ceiling() {
        let config = MigrationConfig {
            batch_size: Some(10_000),
            memory_limit_mb: Some(64),
            ..Default::default()
        };
        // 64 MB / 64 KiB = 1024 documents
        assert_eq!(config.effective_batch_size(), 1024);

        let config = MigrationConfig {
            batch_size: Some(100),
            memory_limit_mb: Some(0),
            ..Default::default()
        };
        assert_eq!(config.effective_batch_size(), 1);
    }

    #[test]
    fn test_effective_batch_size_with_huge_memory_limit() {
        for limit in [u64::MAX / 1024, u64::MAX] {
            let config = MigrationConfig {
                batch_size: Some(100),
                memory_limit_mb: Some(limit),
                ..Default::default()
            };
            assert_eq!(config.effective_batch_size(), 100);
        }
    }

    #[test]
    fn test_default_path_rewrite() {
        let config = MigrationConfig::default();
        assert_eq!(config.path_rewrites.len(), 1);
        assert_eq!(config.path_rewrites[0].from, "/storage/app/public/");
        assert_eq!(config.path_rewrites[0].to, "/data/file/{board}/");
    }
}
