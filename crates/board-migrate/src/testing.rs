//! In-memory stores for unit tests.
//!
//! [`FakeTarget`] enforces what a strict-mode MySQL server would: unknown
//! columns and missing required columns fail, over-long values report
//! [`InsertOutcome::PayloadTooLarge`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::row::{InsertSpec, UpdateSpec};
use crate::core::schema::{ColumnInfo, RequiredColumn, StorageClass};
use crate::core::traits::{InsertOutcome, SourceStore, TargetStore};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};
use crate::source::types::{LegacyDocument, LegacyMember, LegacyModule, LegacySite};

/// A live document with a regdate derived from its srl.
pub fn doc(srl: i64, title: &str, status: &str) -> LegacyDocument {
    LegacyDocument {
        document_srl: Some(srl),
        title: Some(title.to_string()),
        content: Some(format!("<p>{}</p>", title)),
        readed_count: Some(srl * 10),
        user_id: Some("writer".to_string()),
        user_name: Some("Writer".to_string()),
        nick_name: Some("w".to_string()),
        regdate: Some(format!("20240101{:06}", srl)),
        ipaddress: Some("127.0.0.1".to_string()),
        status: Some(status.to_string()),
    }
}

pub fn member(srl: i64, user_id: &str) -> LegacyMember {
    LegacyMember {
        member_srl: Some(srl),
        user_id: Some(user_id.to_string()),
        password: Some(format!("legacy-hash-{}", srl)),
        user_name: Some(format!("Name {}", srl)),
        nick_name: Some(format!("nick{}", srl)),
        email_address: Some(format!("{}@example.com", user_id)),
        homepage: None,
        regdate: Some("20230505101010".to_string()),
        last_login: None,
    }
}

// ===== Source =====

pub struct FakeSource {
    tables: Vec<String>,
    boards: Vec<(LegacyModule, Vec<LegacyDocument>)>,
    members: Vec<LegacyMember>,
    site: Option<LegacySite>,
    fail_stream: bool,
}

impl FakeSource {
    /// A source holding the complete legacy schema under `prefix`.
    pub fn new(prefix: &str) -> Self {
        Self {
            tables: ["modules", "documents", "member", "sites"]
                .iter()
                .map(|t| format!("{}{}", prefix, t))
                .collect(),
            boards: Vec::new(),
            members: Vec::new(),
            site: None,
            fail_stream: false,
        }
    }

    pub fn with_tables(mut self, tables: &[&str]) -> Self {
        self.tables = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_board(self, module_srl: i64, mid: &str, docs: Vec<LegacyDocument>) -> Self {
        self.with_module(
            LegacyModule {
                module_srl,
                mid: Some(mid.to_string()),
                browser_title: Some(format!("{} board", mid)),
                title: None,
            },
            docs,
        )
    }

    pub fn with_module(mut self, module: LegacyModule, docs: Vec<LegacyDocument>) -> Self {
        self.boards.push((module, docs));
        self
    }

    pub fn with_members(mut self, members: Vec<LegacyMember>) -> Self {
        self.members = members;
        self
    }

    pub fn with_site(mut self, title: Option<&str>, domain: Option<&str>) -> Self {
        self.site = Some(LegacySite {
            title: title.map(str::to_string),
            domain: domain.map(str::to_string),
        });
        self
    }

    pub fn failing_stream(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    fn documents(&self, module_srl: i64) -> Vec<LegacyDocument> {
        let mut docs = self
            .boards
            .iter()
            .find(|(m, _)| m.module_srl == module_srl)
            .map(|(_, docs)| docs.clone())
            .unwrap_or_default();
        docs.sort_by(|a, b| a.regdate.cmp(&b.regdate));
        docs
    }
}

#[async_trait]
impl SourceStore for FakeSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }

    async fn load_boards(&self, _prefix: &str) -> Result<Vec<LegacyModule>> {
        Ok(self.boards.iter().map(|(m, _)| m.clone()).collect())
    }

    async fn count_documents(&self, _prefix: &str, module_srl: i64) -> Result<i64> {
        Ok(self.documents(module_srl).len() as i64)
    }

    fn stream_documents(
        &self,
        _prefix: &str,
        module_srl: i64,
        buffer: usize,
    ) -> mpsc::Receiver<Result<LegacyDocument>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let docs = self.documents(module_srl);
        let fail = self.fail_stream;
        tokio::spawn(async move {
            if fail {
                let _ = tx
                    .send(Err(MigrateError::transfer("documents", "cursor lost")))
                    .await;
                return;
            }
            for d in docs {
                if tx.send(Ok(d)).await.is_err() {
                    return;
                }
            }
        });
        rx
    }

    async fn load_members(
        &self,
        _prefix: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LegacyMember>> {
        Ok(self
            .members
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn load_site(&self, _prefix: &str) -> Result<Option<LegacySite>> {
        Ok(self.site.clone())
    }

    fn db_type(&self) -> &str {
        "fake"
    }

    async fn close(&self) {}
}

// ===== Target =====

#[derive(Debug, Clone)]
struct FakeColumn {
    name: String,
    data_type: String,
    max_length: Option<u64>,
    required: bool,
    auto_increment: bool,
}

fn col(name: &str, data_type: &str, max_length: Option<u64>, required: bool) -> FakeColumn {
    FakeColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        max_length,
        required,
        auto_increment: false,
    }
}

fn id_col(name: &str) -> FakeColumn {
    FakeColumn {
        auto_increment: true,
        ..col(name, "int", None, true)
    }
}

#[derive(Debug, Clone, Default)]
struct FakeTable {
    columns: Vec<FakeColumn>,
    rows: Vec<InsertSpec>,
    next_id: u64,
}

impl FakeTable {
    fn new(columns: Vec<FakeColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn column(&self, name: &str) -> Option<&FakeColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn matching(&self, column: &str, value: &SqlValue) -> usize {
        self.rows
            .iter()
            .filter(|r| r.value(column) == Some(value))
            .count()
    }
}

#[derive(Debug, Default)]
struct TargetState {
    tables: BTreeMap<String, FakeTable>,
    mutations: Vec<String>,
    insert_attempts: HashMap<String, usize>,
    introspections: HashMap<String, usize>,
}

pub struct FakeTarget {
    state: Mutex<TargetState>,
    fail_widen: bool,
}

const TEXT_MAX: Option<u64> = Some(65_535);
const LONGTEXT_MAX: Option<u64> = Some(4_294_967_295);

fn post_table_columns() -> Vec<FakeColumn> {
    let mut columns = vec![id_col("wr_id")];
    for (name, data_type, max) in [
        ("wr_num", "int", None),
        ("wr_reply", "varchar", Some(255)),
        ("wr_parent", "int", None),
        ("wr_is_comment", "tinyint", None),
        ("wr_comment", "int", None),
        ("wr_subject", "varchar", Some(255)),
        ("wr_hit", "int", None),
        ("wr_name", "varchar", Some(255)),
        ("wr_password", "varchar", Some(255)),
        ("wr_email", "varchar", Some(255)),
        ("wr_homepage", "varchar", Some(255)),
        ("wr_datetime", "varchar", Some(25)),
        ("wr_last", "varchar", Some(25)),
        ("wr_ip", "varchar", Some(40)),
        ("mb_id", "varchar", Some(20)),
    ] {
        columns.push(col(name, data_type, max, false));
    }
    columns.push(col("wr_content", "text", TEXT_MAX, true));
    columns
}

impl FakeTarget {
    /// Empty database.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(TargetState::default()),
            fail_widen: false,
        }
    }

    /// A GNUBoard-shaped database with the stock registry tables, including
    /// a few required columns the migration does not know about.
    pub fn gnuboard() -> Self {
        let target = Self::empty();
        target.with_table(
            "g5_board",
            vec![
                col("bo_table", "varchar", Some(20), true),
                col("bo_subject", "varchar", Some(255), true),
                col("bo_content_head", "text", TEXT_MAX, true),
                col("bo_page_rows", "int", None, false),
                col("bo_mobile_page_rows", "int", None, false),
                col("bo_skin", "varchar", Some(255), false),
                col("bo_mobile_skin", "varchar", Some(255), false),
                col("bo_count_write", "int", None, false),
                col("bo_notice", "text", TEXT_MAX, true),
                col("bo_list_level", "tinyint", None, true),
            ],
        );
        target.with_table(
            "g5_member",
            vec![
                id_col("mb_no"),
                col("mb_id", "varchar", Some(20), true),
                col("mb_password", "varchar", Some(255), true),
                col("mb_name", "varchar", Some(255), false),
                col("mb_nick", "varchar", Some(255), false),
                col("mb_email", "varchar", Some(255), false),
                col("mb_homepage", "varchar", Some(255), false),
                col("mb_datetime", "datetime", None, false),
                col("mb_today_login", "datetime", None, false),
                col("mb_memo", "text", TEXT_MAX, true),
                col("mb_signature", "text", TEXT_MAX, true),
                col("mb_point", "int", None, true),
            ],
        );
        target.with_table(
            "g5_menu",
            vec![
                id_col("me_id"),
                col("me_code", "varchar", Some(255), true),
                col("me_name", "varchar", Some(255), true),
                col("me_link", "varchar", Some(255), true),
                col("me_target", "varchar", Some(255), false),
                col("me_order", "int", None, false),
                col("me_use", "tinyint", None, false),
            ],
        );
        target.with_table(
            "g5_config",
            vec![
                col("cf_title", "varchar", Some(255), false),
                col("cf_admin", "varchar", Some(100), true),
            ],
        );
        target
    }

    pub fn failing_widen(mut self) -> Self {
        self.fail_widen = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state.lock().unwrap()
    }

    fn with_table(&self, name: &str, columns: Vec<FakeColumn>) {
        self.state()
            .tables
            .insert(name.to_string(), FakeTable::new(columns));
    }

    /// Change a column's type and capacity, adding it if absent.
    pub fn set_column(&self, table: &str, column: &str, data_type: &str, max_length: Option<u64>) {
        let mut state = self.state();
        let t = state.tables.get_mut(table).expect("table exists");
        match t.columns.iter_mut().find(|c| c.name == column) {
            Some(c) => {
                c.data_type = data_type.to_string();
                c.max_length = max_length;
            }
            None => t.columns.push(col(column, data_type, max_length, false)),
        }
    }

    pub fn drop_column(&self, table: &str, column: &str) {
        let mut state = self.state();
        let t = state.tables.get_mut(table).expect("table exists");
        t.columns.retain(|c| c.name != column);
    }

    /// Insert a row directly, bypassing checks and the mutation log.
    pub fn seed_row(&self, table: &str, values: &[(&str, SqlValue)]) {
        let mut state = self.state();
        let t = state.tables.get_mut(table).expect("table exists");
        t.rows.push(InsertSpec {
            table: table.to_string(),
            columns: values
                .iter()
                .map(|(c, v)| (c.to_string(), v.clone()))
                .collect(),
        });
    }

    pub fn rows(&self, table: &str) -> Vec<InsertSpec> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state().mutations.clone()
    }

    pub fn insert_attempts(&self, table: &str) -> usize {
        self.state().insert_attempts.get(table).copied().unwrap_or(0)
    }

    pub fn introspections(&self, table: &str) -> usize {
        self.state().introspections.get(table).copied().unwrap_or(0)
    }

    /// Tables and rows, for before/after comparisons.
    pub fn snapshot(&self) -> Vec<(String, Vec<InsertSpec>)> {
        self.state()
            .tables
            .iter()
            .map(|(name, t)| (name.clone(), t.rows.clone()))
            .collect()
    }
}

fn missing(table: &str) -> MigrateError {
    MigrateError::TableNotFound(table.to_string())
}

#[async_trait]
impl TargetStore for FakeTarget {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state().tables.contains_key(table))
    }

    async fn required_columns(&self, table: &str) -> Result<Vec<RequiredColumn>> {
        let mut state = self.state();
        *state.introspections.entry(table.to_string()).or_default() += 1;
        Ok(state
            .tables
            .get(table)
            .map(|t| {
                t.columns
                    .iter()
                    .filter(|c| c.required && !c.auto_increment)
                    .map(|c| {
                        RequiredColumn::new(c.name.clone(), StorageClass::from_data_type(&c.data_type))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn column_info(&self, table: &str, column: &str) -> Result<Option<ColumnInfo>> {
        Ok(self
            .state()
            .tables
            .get(table)
            .and_then(|t| t.column(column))
            .map(|c| ColumnInfo::new(c.data_type.clone(), c.max_length)))
    }

    async fn row_exists(&self, table: &str, column: &str, value: &SqlValue) -> Result<bool> {
        let state = self.state();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(t.matching(column, value) > 0)
    }

    async fn has_rows(&self, table: &str) -> Result<bool> {
        let state = self.state();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(!t.rows.is_empty())
    }

    async fn count_matching(&self, table: &str, column: &str, value: &SqlValue) -> Result<i64> {
        let state = self.state();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(t.matching(column, value) as i64)
    }

    async fn min_value(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let state = self.state();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(t.rows
            .iter()
            .filter_map(|r| r.value(column).and_then(SqlValue::as_i64))
            .min())
    }

    async fn insert(&self, spec: &InsertSpec) -> Result<InsertOutcome> {
        let mut state = self.state();
        *state.insert_attempts.entry(spec.table.clone()).or_default() += 1;
        let t = state
            .tables
            .get_mut(&spec.table)
            .ok_or_else(|| missing(&spec.table))?;

        for (name, value) in &spec.columns {
            let column = t.column(name).ok_or_else(|| {
                MigrateError::transfer(&spec.table, format!("Unknown column '{}'", name))
            })?;
            if let (Some(text), Some(max)) = (value.as_text(), column.max_length) {
                let info = ColumnInfo::new(column.data_type.clone(), column.max_length);
                if info.measure(text) as u64 > max {
                    return Ok(InsertOutcome::PayloadTooLarge {
                        column: Some(column.name.clone()),
                    });
                }
            }
        }
        for column in t.columns.iter().filter(|c| c.required && !c.auto_increment) {
            if spec.value(&column.name).is_none() {
                return Err(MigrateError::transfer(
                    &spec.table,
                    format!("Field '{}' doesn't have a default value", column.name),
                ));
            }
        }

        let mut row = spec.clone();
        let id = match t.columns.iter().find(|c| c.auto_increment) {
            Some(id_column) => {
                let id = t.next_id;
                t.next_id += 1;
                row.columns.insert(0, (id_column.name.clone(), SqlValue::I64(id as i64)));
                id
            }
            None => 0,
        };
        t.rows.push(row);
        state.mutations.push(spec.to_string());
        Ok(InsertOutcome::Inserted { id })
    }

    async fn update(&self, spec: &UpdateSpec) -> Result<u64> {
        let mut state = self.state();
        let t = state
            .tables
            .get_mut(&spec.table)
            .ok_or_else(|| missing(&spec.table))?;

        let mut affected = 0;
        for row in t.rows.iter_mut() {
            let hit = match &spec.key {
                Some((column, value)) => row.value(column) == Some(value),
                None => affected == 0,
            };
            if !hit {
                continue;
            }
            for (column, value) in &spec.set {
                if !row.set(column, value.clone()) {
                    row.columns.push((column.clone(), value.clone()));
                }
            }
            affected += 1;
        }
        state.mutations.push(spec.to_string());
        Ok(affected)
    }

    async fn create_post_table(&self, table: &str) -> Result<()> {
        let mut state = self.state();
        state
            .tables
            .entry(table.to_string())
            .or_insert_with(|| FakeTable::new(post_table_columns()));
        state.mutations.push(format!("CREATE TABLE {}", table));
        Ok(())
    }

    async fn widen_text_column(&self, table: &str, column: &str) -> Result<()> {
        if self.fail_widen {
            return Err(MigrateError::transfer(table, "ALTER command denied"));
        }
        let mut state = self.state();
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        if let Some(c) = t.columns.iter_mut().find(|c| c.name == column) {
            c.data_type = "longtext".to_string();
            c.max_length = LONGTEXT_MAX;
        }
        state.mutations.push(format!("ALTER TABLE {} MODIFY {}", table, column));
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str, definition: &str) -> Result<()> {
        let mut state = self.state();
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        let data_type = definition
            .split_whitespace()
            .next()
            .unwrap_or("text")
            .to_lowercase();
        t.columns.push(col(column, &data_type, None, false));
        state
            .mutations
            .push(format!("ALTER TABLE {} ADD COLUMN {}", table, column));
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake"
    }

    async fn close(&self) {}
}
