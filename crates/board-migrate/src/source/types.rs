//! Legacy (Rhymix/XE) entity rows.
//!
//! Every column is optional: XE and Rhymix versions differ in which columns
//! exist, and the drivers read `SELECT *` rows leniently.

use serde::{Deserialize, Serialize};

/// A `<prefix>modules` row with `module = 'board'`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyModule {
    pub module_srl: i64,
    /// Machine identifier used in URLs.
    pub mid: Option<String>,
    pub browser_title: Option<String>,
    pub title: Option<String>,
}

impl LegacyModule {
    /// Display title: `browser_title`, then `title`, then the machine id.
    pub fn display_title(&self) -> String {
        non_empty(&self.browser_title)
            .or_else(|| self.title.clone())
            .or_else(|| self.mid.clone())
            .unwrap_or_else(|| format!("board_{}", self.module_srl))
    }
}

/// A `<prefix>documents` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyDocument {
    pub document_srl: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub readed_count: Option<i64>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub nick_name: Option<String>,
    /// `YYYYMMDDHHMMSS` in stock installs.
    pub regdate: Option<String>,
    pub ipaddress: Option<String>,
    pub status: Option<String>,
}

impl LegacyDocument {
    /// Soft-deleted documents carry `status = 'DELETED'`.
    pub fn is_deleted(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("DELETED"))
    }

    /// Author display name: real name, then nickname.
    pub fn author_name(&self) -> String {
        non_empty(&self.user_name)
            .or_else(|| self.nick_name.clone())
            .unwrap_or_default()
    }

    /// Id for log lines.
    pub fn label(&self) -> String {
        self.document_srl
            .map(|srl| srl.to_string())
            .unwrap_or_else(|| "(unknown)".to_string())
    }
}

/// A `<prefix>member` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMember {
    pub member_srl: Option<i64>,
    pub user_id: Option<String>,
    /// Legacy credential hash; only ever copied into provenance text.
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub nick_name: Option<String>,
    pub email_address: Option<String>,
    pub homepage: Option<String>,
    pub regdate: Option<String>,
    pub last_login: Option<String>,
}

/// The `<prefix>sites` singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySite {
    pub title: Option<String>,
    pub domain: Option<String>,
}

impl LegacySite {
    pub fn site_title(&self) -> String {
        non_empty(&self.title)
            .or_else(|| non_empty(&self.domain))
            .unwrap_or_else(|| "Migrated site".to_string())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}
