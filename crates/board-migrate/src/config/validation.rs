//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }
    if config.source.r#type != "mysql" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'mysql', got '{}'",
            config.source.r#type
        )));
    }
    if let Some(prefix) = &config.source.table_prefix {
        validate_prefix("source.table_prefix", prefix)?;
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.r#type != "mysql" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'mysql', got '{}'",
            config.target.r#type
        )));
    }
    validate_prefix("target.table_prefix", &config.target.table_prefix)?;

    // Cannot migrate into the database we read from
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    // Migration config validation - only check if explicitly set
    if let Some(0) = config.migration.batch_size {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    for rewrite in &config.migration.path_rewrites {
        if rewrite.from.is_empty() {
            return Err(MigrateError::Config(
                "migration.path_rewrites entries need a non-empty 'from'".into(),
            ));
        }
    }
    if config.migration.board_defaults.page_rows < 1
        || config.migration.board_defaults.mobile_page_rows < 1
    {
        return Err(MigrateError::Config(
            "migration.board_defaults page rows must be at least 1".into(),
        ));
    }

    Ok(())
}

/// Table prefixes end up inside identifiers, so keep them to `[A-Za-z0-9_]`.
fn validate_prefix(field: &str, prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(MigrateError::Config(format!("{} cannot be empty", field)));
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::Config(format!(
            "{} may only contain letters, digits and '_', got '{}'",
            field, prefix
        )));
    }
    Ok(())
}
