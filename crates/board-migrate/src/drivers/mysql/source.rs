//! Legacy board schema reader.
//!
//! Uses SQLx for connection pooling and streams documents from a
//! server-side cursor so a large board never sits in memory at once.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::quote_mysql;
use crate::core::traits::SourceStore;
use crate::error::{MigrateError, Result};
use crate::source::types::{LegacyDocument, LegacyMember, LegacyModule, LegacySite};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE for "base table or view not found".
const SQLSTATE_NO_SUCH_TABLE: &str = "42S02";

/// MySQL/MariaDB reader for the legacy schema.
pub struct MysqlSource {
    pool: MySqlPool,
}

impl MysqlSource {
    /// Connect and verify the source database.
    pub async fn new(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .charset("utf8mb4")
            .ssl_mode(ssl_mode_from(&config.ssl_mode));

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(2) as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;

        info!("Connected to legacy source: {}", config.endpoint());

        Ok(Self { pool })
    }

    fn table(prefix: &str, name: &str) -> Result<String> {
        quote_mysql(&format!("{}{}", prefix, name))
    }

    fn module_from_row(row: &MySqlRow) -> LegacyModule {
        LegacyModule {
            module_srl: opt_i64(row, "module_srl").unwrap_or_default(),
            mid: opt_text(row, "mid"),
            browser_title: opt_text(row, "browser_title"),
            title: opt_text(row, "title"),
        }
    }

    fn document_from_row(row: &MySqlRow) -> LegacyDocument {
        LegacyDocument {
            document_srl: opt_i64(row, "document_srl"),
            title: opt_text(row, "title"),
            content: opt_text(row, "content"),
            readed_count: opt_i64(row, "readed_count"),
            user_id: opt_text(row, "user_id"),
            user_name: opt_text(row, "user_name"),
            nick_name: opt_text(row, "nick_name"),
            regdate: opt_text(row, "regdate"),
            ipaddress: opt_text(row, "ipaddress"),
            status: opt_text(row, "status"),
        }
    }

    fn member_from_row(row: &MySqlRow) -> LegacyMember {
        LegacyMember {
            member_srl: opt_i64(row, "member_srl"),
            user_id: opt_text(row, "user_id"),
            password: opt_text(row, "password"),
            user_name: opt_text(row, "user_name"),
            nick_name: opt_text(row, "nick_name"),
            email_address: opt_text(row, "email_address"),
            homepage: opt_text(row, "homepage"),
            regdate: opt_text(row, "regdate"),
            last_login: opt_text(row, "last_login"),
        }
    }

    async fn stream_documents_impl(
        pool: MySqlPool,
        prefix: String,
        module_srl: i64,
        tx: mpsc::Sender<Result<LegacyDocument>>,
    ) -> Result<()> {
        let table = format!("{}documents", prefix);
        let sql = format!(
            "SELECT * FROM {} WHERE module_srl = ? ORDER BY regdate ASC",
            Self::table(&prefix, "documents")?
        );

        let mut rows = sqlx::query(&sql).bind(module_srl).fetch(&pool);
        let mut sent = 0u64;

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| query_error(&table, e, "streaming legacy documents"))?
        {
            if tx.send(Ok(Self::document_from_row(&row))).await.is_err() {
                debug!(
                    "Document receiver dropped after {} rows (module_srl={})",
                    sent, module_srl
                );
                return Ok(());
            }
            sent += 1;
        }

        debug!("Streamed {} documents for module_srl={}", sent, module_srl);
        Ok(())
    }
}

#[async_trait]
impl SourceStore for MysqlSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<MySqlRow> = sqlx::query(
            r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("INFORMATION_SCHEMA.TABLES", e, "listing source tables"))?;

        let tables: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("TABLE_NAME"))
            .collect();
        debug!("Source catalog holds {} tables", tables.len());
        Ok(tables)
    }

    async fn load_boards(&self, prefix: &str) -> Result<Vec<LegacyModule>> {
        let sql = format!(
            "SELECT * FROM {} WHERE module = 'board' ORDER BY module_srl",
            Self::table(prefix, "modules")?
        );
        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error(&format!("{}modules", prefix), e, "loading board modules"))?;

        Ok(rows.iter().map(Self::module_from_row).collect())
    }

    async fn count_documents(&self, prefix: &str, module_srl: i64) -> Result<i64> {
        let table = format!("{}documents", prefix);
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM {} WHERE module_srl = ?",
            Self::table(prefix, "documents")?
        );
        let row: MySqlRow = sqlx::query(&sql)
            .bind(module_srl)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error(&table, e, "counting legacy documents"))?;

        Ok(row.get::<i64, _>("cnt"))
    }

    fn stream_documents(
        &self,
        prefix: &str,
        module_srl: i64,
        buffer: usize,
    ) -> mpsc::Receiver<Result<LegacyDocument>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let pool = self.pool.clone();
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            let result = Self::stream_documents_impl(pool, prefix, module_srl, tx.clone()).await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn load_members(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LegacyMember>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY member_srl LIMIT ? OFFSET ?",
            Self::table(prefix, "member")?
        );
        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .bind(limit as u64)
            .bind(offset as u64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error(&format!("{}member", prefix), e, "loading legacy members"))?;

        Ok(rows.iter().map(Self::member_from_row).collect())
    }

    async fn load_site(&self, prefix: &str) -> Result<Option<LegacySite>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", Self::table(prefix, "sites")?);
        match sqlx::query(&sql).fetch_optional(&self.pool).await {
            Ok(row) => Ok(row.map(|row| LegacySite {
                title: opt_text(&row, "title"),
                domain: opt_text(&row, "domain"),
            })),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(SQLSTATE_NO_SUCH_TABLE) => {
                warn!("Source has no {}sites table", prefix);
                Ok(None)
            }
            Err(e) => Err(query_error(&format!("{}sites", prefix), e, "loading legacy site")),
        }
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A query that failed after the pool was up.
fn query_error(table: &str, e: sqlx::Error, context: &str) -> MigrateError {
    MigrateError::transfer(table, format!("{}: {}", context, e))
}

fn ssl_mode_from(mode: &str) -> MySqlSslMode {
    match mode.to_lowercase().as_str() {
        "disable" => {
            warn!("MySQL TLS is disabled for the source. Credentials will be transmitted in plaintext.");
            MySqlSslMode::Disabled
        }
        "prefer" => MySqlSslMode::Preferred,
        "require" => MySqlSslMode::Required,
        "verify-ca" | "verify_ca" => MySqlSslMode::VerifyCa,
        "verify-full" | "verify_identity" => MySqlSslMode::VerifyIdentity,
        other => {
            warn!("Unknown ssl_mode '{}', defaulting to Preferred", other);
            MySqlSslMode::Preferred
        }
    }
}

fn is_null(row: &MySqlRow, column: &str) -> bool {
    row.try_get_raw(column).map(|v| v.is_null()).unwrap_or(true)
}

/// Read a column as text whatever its declared type; absent columns and
/// NULLs are `None`.
fn opt_text(row: &MySqlRow, column: &str) -> Option<String> {
    if is_null(row, column) {
        return None;
    }
    row.try_get::<String, _>(column)
        .ok()
        .or_else(|| row.try_get::<i64, _>(column).ok().map(|v| v.to_string()))
        .or_else(|| row.try_get::<u64, _>(column).ok().map(|v| v.to_string()))
        .or_else(|| {
            row.try_get::<Vec<u8>, _>(column)
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        })
}

/// Read a column as a signed integer, parsing text columns if needed.
fn opt_i64(row: &MySqlRow, column: &str) -> Option<i64> {
    if is_null(row, column) {
        return None;
    }
    row.try_get::<i64, _>(column)
        .ok()
        .or_else(|| {
            row.try_get::<u64, _>(column)
                .ok()
                .map(|v| i64::try_from(v).unwrap_or(i64::MAX))
        })
        .or_else(|| {
            row.try_get::<String, _>(column)
                .ok()
                .and_then(|s| s.trim().parse().ok())
        })
}
