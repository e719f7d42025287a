//! Identifier validation, quoting, and board-key derivation.
//!
//! SQL identifiers (table names, column names) cannot be passed as parameters
//! in prepared statements, and this tool builds table names dynamically from
//! legacy module ids. Every identifier that reaches a statement therefore goes
//! through [`quote_mysql`], and every board key goes through
//! [`sanitize_board_key`] first.

use crate::error::{MigrateError, Result};

/// MySQL identifier length limit.
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Maximum length of a GNUBoard `bo_table` key.
pub const MAX_BOARD_KEY_LENGTH: usize = 20;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// Escapes backticks by doubling them and wraps in backticks.
/// Validates the identifier before quoting.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Derive a table-safe board key from a legacy module id.
///
/// Lower-cases ASCII, replaces everything outside `[a-z0-9_]` with `_`,
/// collapses runs of `_`, and cuts the result to 20 characters.
pub fn sanitize_board_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && key.ends_with('_') {
            continue;
        }
        key.push(c);
    }
    // Only ASCII remains, so byte truncation is a char boundary.
    key.truncate(MAX_BOARD_KEY_LENGTH);
    key
}

/// Board key for a legacy module, falling back to `board_<module_srl>` when the
/// module id has no usable characters (e.g. a Hangul-only `mid`).
pub fn board_key_for(mid: Option<&str>, module_srl: i64) -> String {
    let fallback = || sanitize_board_key(&format!("board_{}", module_srl));
    match mid {
        Some(mid) => {
            let key = sanitize_board_key(mid);
            if key.chars().any(|c| c.is_ascii_alphanumeric()) {
                key
            } else {
                fallback()
            }
        }
        None => fallback(),
    }
}
