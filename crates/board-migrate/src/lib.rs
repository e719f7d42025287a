//! # board-migrate
//!
//! Migrates a Rhymix/XE forum into a GNUBoard installation.
//!
//! The engine discovers the legacy table prefix, then walks every board
//! module through registry row, post table, posts and menu entry before
//! copying members and the site title. It adapts to whatever the destination
//! schema looks like:
//!
//! - **Required columns** the migration does not know about are filled with
//!   type-appropriate defaults
//! - **Idempotent re-runs** skip boards, members and menu entries that exist
//! - **Oversized bodies** widen the column, or are truncated with a note
//! - **Dry-run** logs every mutation without writing
//!
//! ## Example
//!
//! ```rust,no_run
//! use board_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("Migrated {} posts", result.stats.posts_created);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod transfer;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    DetectionReport, DryRunTarget, HealthCheckResult, MigrationResult, Orchestrator,
};
pub use transfer::EntityStats;
