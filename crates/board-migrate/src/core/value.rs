//! SQL values bound to destination statements.

use std::fmt;

/// A bound parameter value.
///
/// The destination schema is almost entirely integers and strings; dates are
/// written as `YYYY-MM-DD HH:MM:SS` text like GNUBoard itself does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlValue {
    Null,
    I64(i64),
    Text(String),
}

impl SqlValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I64(i64::from(v))
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::I64(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Short rendering for dry-run and progress lines; long text is elided.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW_CHARS: usize = 40;
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::Text(s) => {
                let count = s.chars().count();
                if count > PREVIEW_CHARS {
                    let head: String = s.chars().take(PREVIEW_CHARS).collect();
                    write!(f, "'{}…' ({} chars)", head, count)
                } else {
                    write!(f, "'{}'", s)
                }
            }
        }
    }
}
