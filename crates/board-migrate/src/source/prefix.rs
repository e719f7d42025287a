//! Legacy table-prefix detection.
//!
//! Rhymix installs use `rhymix_`, XE installs `xe_`, and hosted installs
//! often pick their own prefix. The prefix is found from the catalog alone.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// Known product prefixes, in order of preference.
const KNOWN_PREFIXES: &[&str] = &["rhymix", "xe"];

const MODULES_SUFFIX: &str = "_modules";

/// Infer the legacy table prefix (including the trailing `_`).
///
/// 1. The first `<p>_modules` whose `<p>_documents` and `<p>_member`
///    siblings both exist wins immediately.
/// 2. Otherwise a candidate from [`KNOWN_PREFIXES`].
/// 3. Otherwise the first `<p>_modules` encountered.
pub fn detect_prefix<S: AsRef<str>>(tables: &[S]) -> Result<String> {
    let names: HashSet<&str> = tables.iter().map(|t| t.as_ref()).collect();

    let candidates: Vec<&str> = tables
        .iter()
        .filter_map(|t| t.as_ref().strip_suffix(MODULES_SUFFIX))
        .filter(|candidate| !candidate.is_empty())
        .collect();

    if candidates.is_empty() {
        return Err(MigrateError::NoSourceSchemaFound(format!(
            "no '*{}' table among {} tables",
            MODULES_SUFFIX,
            tables.len()
        )));
    }

    for candidate in &candidates {
        let documents = format!("{}_documents", candidate);
        let member = format!("{}_member", candidate);
        if names.contains(documents.as_str()) && names.contains(member.as_str()) {
            info!("Detected legacy table prefix '{}_' (complete schema)", candidate);
            return Ok(format!("{}_", candidate));
        }
        debug!("Prefix candidate '{}_' is missing sibling tables", candidate);
    }

    for known in KNOWN_PREFIXES {
        if candidates.contains(known) {
            info!("Detected legacy table prefix '{}_' (known product prefix)", known);
            return Ok(format!("{}_", known));
        }
    }

    let first = candidates[0];
    info!("Detected legacy table prefix '{}_' (first candidate)", first);
    Ok(format!("{}_", first))
}

/// Check a configured prefix against the catalog.
pub fn verify_prefix<S: AsRef<str>>(tables: &[S], prefix: &str) -> Result<String> {
    let modules = format!("{}modules", prefix);
    if tables.iter().any(|t| t.as_ref() == modules) {
        info!("Using configured legacy table prefix '{}'", prefix);
        Ok(prefix.to_string())
    } else {
        Err(MigrateError::NoSourceSchemaFound(format!(
            "configured prefix '{}' has no '{}' table",
            prefix, modules
        )))
    }
}
