//! Destination forum schema writer.
//!
//! Uses mysql_async for connection pooling. Every write is a single-row
//! prepared statement; identifiers are quoted, values are always bound.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::quote_mysql;
use crate::core::row::{InsertSpec, UpdateSpec};
use crate::core::schema::{ColumnInfo, RequiredColumn, StorageClass};
use crate::core::traits::{InsertOutcome, TargetStore};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// ER_DATA_TOO_LONG
const ER_DATA_TOO_LONG: u16 = 1406;
/// ER_NO_SUCH_TABLE
const ER_NO_SUCH_TABLE: u16 = 1146;

/// MySQL/MariaDB writer for the destination forum schema.
pub struct MysqlTarget {
    pool: Pool,
}

impl MysqlTarget {
    /// Connect and verify the destination database.
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => {
                Some(SslOpts::default())
            }
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to Preferred",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(1, max_conns.max(1))
            .ok_or_else(|| MigrateError::Config("invalid target pool size".to_string()))?;
        let opts: Opts = builder
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL target pool"))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL target connection"))?;
        drop(conn);

        info!("Connected to destination: {}", config.endpoint());

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::pool(e, "getting MySQL connection"))
    }

    /// DDL for a per-board post table.
    pub fn post_table_ddl(table: &str) -> Result<String> {
        Ok(format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    `wr_id` INT NOT NULL AUTO_INCREMENT,
    `wr_num` INT NOT NULL DEFAULT 0,
    `wr_reply` VARCHAR(255) NOT NULL DEFAULT '',
    `wr_parent` INT NOT NULL DEFAULT 0,
    `wr_is_comment` TINYINT(1) NOT NULL DEFAULT 0,
    `wr_comment` INT NOT NULL DEFAULT 0,
    `wr_subject` VARCHAR(255) NOT NULL DEFAULT '',
    `wr_content` TEXT NOT NULL,
    `wr_hit` INT NOT NULL DEFAULT 0,
    `wr_name` VARCHAR(255) NOT NULL DEFAULT '',
    `wr_password` VARCHAR(255) NOT NULL DEFAULT '',
    `wr_email` VARCHAR(255) NOT NULL DEFAULT '',
    `wr_homepage` VARCHAR(255) NOT NULL DEFAULT '',
    `wr_datetime` VARCHAR(25) NOT NULL DEFAULT '',
    `wr_last` VARCHAR(25) NOT NULL DEFAULT '',
    `wr_ip` VARCHAR(40) NOT NULL DEFAULT '',
    `mb_id` VARCHAR(20) NOT NULL DEFAULT '',
    PRIMARY KEY (`wr_id`),
    KEY `wr_num` (`wr_num`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
            quote_mysql(table)?
        ))
    }

    fn insert_sql(spec: &InsertSpec) -> Result<String> {
        let columns = spec
            .columns
            .iter()
            .map(|(name, _)| quote_mysql(name))
            .collect::<Result<Vec<_>>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_mysql(&spec.table)?,
            columns.join(", "),
            placeholders
        ))
    }

    fn update_sql(spec: &UpdateSpec) -> Result<String> {
        let assignments = spec
            .set
            .iter()
            .map(|(name, _)| Ok(format!("{} = ?", quote_mysql(name)?)))
            .collect::<Result<Vec<_>>>()?;
        let mut sql = format!(
            "UPDATE {} SET {}",
            quote_mysql(&spec.table)?,
            assignments.join(", ")
        );
        match &spec.key {
            Some((column, _)) => sql.push_str(&format!(" WHERE {} = ?", quote_mysql(column)?)),
            None => sql.push_str(" LIMIT 1"),
        }
        Ok(sql)
    }
}

/// Map a server error, recognising a missing table.
fn classify(table: &str, e: mysql_async::Error, context: &str) -> MigrateError {
    match &e {
        mysql_async::Error::Server(server) if server.code == ER_NO_SUCH_TABLE => {
            MigrateError::TableNotFound(table.to_string())
        }
        _ => MigrateError::transfer(table, format!("{}: {}", context, e)),
    }
}

/// Column named in an ER_DATA_TOO_LONG message
/// (`Data too long for column 'wr_content' at row 1`).
fn overflow_column(message: &str) -> Option<String> {
    let start = message.find("column '")? + "column '".len();
    let rest = &message[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

fn to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::I64(v) => mysql_async::Value::Int(*v),
        SqlValue::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
    }
}

#[async_trait]
impl TargetStore for MysqlTarget {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let count: Option<i64> = conn
            .exec_first(
                r#"
                SELECT COUNT(*) AS cnt FROM information_schema.TABLES
                WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                "#,
                (table,),
            )
            .await
            .map_err(|e| classify(table, e, "checking table existence"))?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn required_columns(&self, table: &str) -> Result<Vec<RequiredColumn>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, String)> = conn
            .exec(
                r#"
                SELECT CAST(COLUMN_NAME AS CHAR(255)), CAST(DATA_TYPE AS CHAR(64))
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                  AND IS_NULLABLE = 'NO'
                  AND COLUMN_DEFAULT IS NULL
                  AND EXTRA NOT LIKE '%auto_increment%'
                  AND EXTRA NOT LIKE '%GENERATED%'
                ORDER BY ORDINAL_POSITION
                "#,
                (table,),
            )
            .await
            .map_err(|e| classify(table, e, "loading required columns"))?;

        let required: Vec<RequiredColumn> = rows
            .into_iter()
            .map(|(name, data_type)| {
                RequiredColumn::new(name, StorageClass::from_data_type(&data_type))
            })
            .collect();
        debug!("{} has {} required columns", table, required.len());
        Ok(required)
    }

    async fn column_info(&self, table: &str, column: &str) -> Result<Option<ColumnInfo>> {
        let mut conn = self.conn().await?;
        let row: Option<(String, Option<u64>)> = conn
            .exec_first(
                r#"
                SELECT CAST(DATA_TYPE AS CHAR(64)), CHARACTER_MAXIMUM_LENGTH
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?
                "#,
                (table, column),
            )
            .await
            .map_err(|e| classify(table, e, "loading column info"))?;

        Ok(row.map(|(data_type, max_length)| ColumnInfo::new(data_type, max_length)))
    }

    async fn row_exists(&self, table: &str, column: &str, value: &SqlValue) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
            quote_mysql(table)?,
            quote_mysql(column)?
        );
        let mut conn = self.conn().await?;
        let hit: Option<i64> = conn
            .exec_first(sql, vec![to_mysql(value)])
            .await
            .map_err(|e| classify(table, e, "existence probe"))?;
        Ok(hit.is_some())
    }

    async fn has_rows(&self, table: &str) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} LIMIT 1", quote_mysql(table)?);
        let mut conn = self.conn().await?;
        let hit: Option<i64> = conn
            .query_first(sql)
            .await
            .map_err(|e| classify(table, e, "row probe"))?;
        Ok(hit.is_some())
    }

    async fn count_matching(&self, table: &str, column: &str, value: &SqlValue) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            quote_mysql(table)?,
            quote_mysql(column)?
        );
        let mut conn = self.conn().await?;
        let count: Option<i64> = conn
            .exec_first(sql, vec![to_mysql(value)])
            .await
            .map_err(|e| classify(table, e, "counting rows"))?;
        Ok(count.unwrap_or(0))
    }

    async fn min_value(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT MIN({}) FROM {}",
            quote_mysql(column)?,
            quote_mysql(table)?
        );
        let mut conn = self.conn().await?;
        let min: Option<Option<i64>> = conn
            .query_first(sql)
            .await
            .map_err(|e| classify(table, e, "reading minimum"))?;
        Ok(min.flatten())
    }

    async fn insert(&self, spec: &InsertSpec) -> Result<InsertOutcome> {
        let sql = Self::insert_sql(spec)?;
        let params: Vec<mysql_async::Value> =
            spec.columns.iter().map(|(_, v)| to_mysql(v)).collect();

        let mut conn = self.conn().await?;
        match conn.exec_drop(&sql, params).await {
            Ok(()) => Ok(InsertOutcome::Inserted {
                id: conn.last_insert_id().unwrap_or(0),
            }),
            Err(mysql_async::Error::Server(server)) if server.code == ER_DATA_TOO_LONG => {
                debug!("{}: {}", spec.table, server.message);
                Ok(InsertOutcome::PayloadTooLarge {
                    column: overflow_column(&server.message),
                })
            }
            Err(e) => Err(classify(&spec.table, e, "INSERT")),
        }
    }

    async fn update(&self, spec: &UpdateSpec) -> Result<u64> {
        let sql = Self::update_sql(spec)?;
        let mut params: Vec<mysql_async::Value> =
            spec.set.iter().map(|(_, v)| to_mysql(v)).collect();
        if let Some((_, key)) = &spec.key {
            params.push(to_mysql(key));
        }

        let mut conn = self.conn().await?;
        conn.exec_drop(&sql, params)
            .await
            .map_err(|e| classify(&spec.table, e, "UPDATE"))?;
        Ok(conn.affected_rows())
    }

    async fn create_post_table(&self, table: &str) -> Result<()> {
        let ddl = Self::post_table_ddl(table)?;
        let mut conn = self.conn().await?;
        conn.query_drop(&ddl)
            .await
            .map_err(|e| MigrateError::transfer(table, format!("CREATE TABLE: {}", e)))?;
        info!("Created post table {}", table);
        Ok(())
    }

    async fn widen_text_column(&self, table: &str, column: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} MODIFY {} LONGTEXT NOT NULL",
            quote_mysql(table)?,
            quote_mysql(column)?
        );
        let mut conn = self.conn().await?;
        conn.query_drop(&sql)
            .await
            .map_err(|e| classify(table, e, "widening column"))?;
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str, definition: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_mysql(table)?,
            quote_mysql(column)?,
            definition
        );
        let mut conn = self.conn().await?;
        conn.query_drop(&sql)
            .await
            .map_err(|e| classify(table, e, "adding column"))?;
        info!("Added column {}.{}", table, column);
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            warn!("Error closing destination pool: {}", e);
        }
    }
}
