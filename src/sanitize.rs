//! SQL input sanitizer.
//!
//! A denylist filter that restricts generated or user-typed SQL to a single
//! `SELECT` statement. It does not parse SQL: it can reject legitimate queries
//! (a string literal containing `'CREATE'`) and it cannot catch obfuscated
//! injections. The database login should still be read-only.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum accepted query length, in characters.
pub const MAX_QUERY_CHARS: usize = 2000;

/// Forbidden patterns, matched against the upper-cased query.
static FORBIDDEN_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // DML/DDL and procedure execution
        (
            Regex::new(
                r"\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|EXEC|EXECUTE)\b|\b(SP|XP)_\w*",
            )
            .unwrap(),
            "data modification keyword",
        ),
        // Semicolon followed by another statement
        (Regex::new(r";\s*\w").unwrap(), "stacked statements"),
        (Regex::new(r"\bUNION\b.*\bSELECT\b").unwrap(), "UNION SELECT"),
        (
            Regex::new(r"\b(OPENROWSET|OPENDATASOURCE|BULK)\b").unwrap(),
            "external data source",
        ),
    ]
});

/// Reasons a query is rejected by [`sanitize_sql`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    #[error("Invalid SQL input")]
    Empty,
    #[error("Only SELECT statements allowed")]
    NotSelect,
    #[error("Forbidden SQL pattern: {pattern}")]
    Forbidden { pattern: &'static str },
    #[error("Query too long ({length} characters, maximum {MAX_QUERY_CHARS})")]
    TooLong { length: usize },
}

/// Validate a query and return it trimmed.
///
/// Checks run in order: non-empty, leading `SELECT`, forbidden patterns,
/// length.
pub fn sanitize_sql(sql: &str) -> Result<String, SanitizeError> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(SanitizeError::Empty);
    }

    let upper = sql.to_uppercase();
    if !upper.starts_with("SELECT") {
        return Err(SanitizeError::NotSelect);
    }

    for (pattern, name) in FORBIDDEN_PATTERNS.iter() {
        if pattern.is_match(&upper) {
            return Err(SanitizeError::Forbidden { pattern: name });
        }
    }

    let length = sql.chars().count();
    if length > MAX_QUERY_CHARS {
        return Err(SanitizeError::TooLong { length });
    }

    Ok(sql.to_string())
}

/// Whether the query would pass [`sanitize_sql`].
pub fn is_safe(sql: &str) -> bool {
    sanitize_sql(sql).is_ok()
}
