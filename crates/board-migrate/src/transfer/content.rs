//! Value conversions applied to legacy content on its way to the destination.

use chrono::{Local, NaiveDateTime};

use crate::config::PathRewrite;

/// Placeholder in a rewrite target replaced by the board key.
pub const BOARD_PLACEHOLDER: &str = "{board}";

const LEGACY_DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";
const TARGET_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Apply every path rewrite rule, in order, scoped to one board.
pub fn rewrite_paths(content: &str, rules: &[PathRewrite], board_key: &str) -> String {
    rules.iter().fold(content.to_string(), |acc, rule| {
        if rule.from.is_empty() {
            return acc;
        }
        let to = rule.to.replace(BOARD_PLACEHOLDER, board_key);
        acc.replace(&rule.from, &to)
    })
}

/// Convert a `YYYYMMDDHHMMSS` timestamp to `YYYY-MM-DD HH:MM:SS`.
///
/// Values in any other shape are returned unchanged.
pub fn legacy_datetime(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() == 14 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, LEGACY_DATETIME_FORMAT) {
            return parsed.format(TARGET_DATETIME_FORMAT).to_string();
        }
    }
    raw.to_string()
}

/// Current local time in destination format.
pub fn now_datetime() -> String {
    Local::now().format(TARGET_DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_rules() -> Vec<PathRewrite> {
        vec![PathRewrite {
            from: "/storage/app/public/".into(),
            to: "/data/file/{board}/".into(),
        }]
    }

    #[test]
    fn test_rewrite_paths_scopes_by_board() {
        let body = r#"<img src="/storage/app/public/a.png"><a href="/storage/app/public/b.pdf">"#;
        let out = rewrite_paths(body, &default_rules(), "free");
        assert_eq!(
            out,
            r#"<img src="/data/file/free/a.png"><a href="/data/file/free/b.pdf">"#
        );
    }

    #[test]
    fn test_rewrite_paths_applies_rules_in_order() {
        let rules = vec![
            PathRewrite {
                from: "/files/attach/".into(),
                to: "/storage/app/public/".into(),
            },
            PathRewrite {
                from: "/storage/app/public/".into(),
                to: "/data/file/{board}/".into(),
            },
        ];
        assert_eq!(
            rewrite_paths("/files/attach/x.jpg", &rules, "qna"),
            "/data/file/qna/x.jpg"
        );
        assert_eq!(rewrite_paths("no paths", &rules, "qna"), "no paths");
    }

    #[test]
    fn test_legacy_datetime() {
        assert_eq!(legacy_datetime("20240131235959"), "2024-01-31 23:59:59");
        assert_eq!(legacy_datetime("2024-01-31 10:00:00"), "2024-01-31 10:00:00");
        assert_eq!(legacy_datetime("20241399000000"), "20241399000000");
        assert_eq!(legacy_datetime(""), "");
    }

    #[test]
    fn test_now_datetime_shape() {
        let now = now_datetime();
        assert_eq!(now.len(), 19);
        assert_eq!(&now[4..5], "-");
    }
}
