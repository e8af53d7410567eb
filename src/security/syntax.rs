//! Keyword and structure rules applied to query text before execution.
//!
//! This is a lexical screen, not a parser: it looks for signals in the
//! lower-cased text and reports the first one found.

use super::ValidationVerdict;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Maximum accepted query length, in characters.
pub const MAX_QUERY_LENGTH: usize = 10_000;

/// Mutating or administrative keywords rejected in non-SELECT statements.
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "drop", "delete", "truncate", "alter", "create", "insert", "update", "grant", "revoke",
    "backup", "restore", "shutdown", "kill",
];

static DANGEROUS_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("trailing statement separator", r";\s*$"),
        ("line comment", r"--"),
        ("block comment", r"/\*.*?\*/"),
        ("union select", r"union\s+select"),
        ("command execution", r"exec\s*\("),
        ("shell procedure", r"xp_cmdshell"),
    ]
    .into_iter()
    .map(|(label, pattern)| {
        let re = Regex::new(&format!("(?i){}", pattern)).expect("static syntax pattern");
        (label, re)
    })
    .collect()
});

/// Returns true when the trimmed statement starts with `select` (any case).
pub fn is_select(query: &str) -> bool {
    query
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

/// Allow/deny classifier for raw statement text.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuerySyntaxValidator;

impl QuerySyntaxValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, query: &str) -> ValidationVerdict {
        let normalized = query.trim().to_lowercase();

        if normalized.is_empty() {
            return ValidationVerdict::deny("SQL query cannot be empty");
        }

        if normalized.starts_with("select") {
            debug!("SELECT query allowed");
            return ValidationVerdict::allow("SELECT query allowed");
        }

        if let Some(keyword) = DANGEROUS_KEYWORDS
            .iter()
            .find(|kw| normalized.contains(*kw))
        {
            warn!(keyword, "Dangerous SQL keyword detected");
            return ValidationVerdict::deny(format!("Dangerous SQL keyword detected: {}", keyword));
        }

        if let Some((label, _)) = DANGEROUS_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(&normalized))
        {
            warn!(pattern = label, "Dangerous SQL pattern detected");
            return ValidationVerdict::deny(format!("Dangerous SQL pattern detected: {}", label));
        }

        if normalized.matches('(').count() != normalized.matches(')').count() {
            warn!("Unbalanced parentheses in SQL query");
            return ValidationVerdict::deny("Unbalanced parentheses in SQL query");
        }

        if query.chars().count() > MAX_QUERY_LENGTH {
            warn!(length = query.chars().count(), "SQL query too long");
            return ValidationVerdict::deny("SQL query too long");
        }

        ValidationVerdict::allow("Query validation passed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(query: &str) -> ValidationVerdict {
        QuerySyntaxValidator::new().validate(query)
    }

    #[test]
    fn test_select_always_allowed() {
        assert!(check("SELECT * FROM incidents").allowed);
        assert!(check("   select 1; DROP TABLE x; --").allowed);
        assert!(check("\n\tSeLeCt (((").allowed);
    }

    #[test]
    fn test_keyword_denied_with_name() {
        let verdict = check("DROP TABLE x");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "Dangerous SQL keyword detected: drop");

        let verdict = check("show grants");
        assert_eq!(verdict.reason, "Dangerous SQL keyword detected: grant");
    }

    #[test]
    fn test_structural_patterns() {
        assert!(check("SHOW TABLES;").reason.contains("trailing statement separator"));
        assert!(check("SHOW TABLES -- x").reason.contains("line comment"));
        assert!(check("SHOW /* hi */ TABLES").reason.contains("block comment"));
        assert!(check("WITH a AS (SELECT 1) UNION SELECT 2").reason.contains("union select"));
        assert!(check("EXEC (x)").reason.contains("command execution"));
        assert!(check("call xp_cmdshell 'dir'").reason.contains("shell procedure"));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let verdict = check("SHOW TABLES WHERE (x = 1");
        assert_eq!(verdict.reason, "Unbalanced parentheses in SQL query");
    }

    #[test]
    fn test_length_limit() {
        let long = format!("SHOW TABLES LIKE '{}'", "a".repeat(MAX_QUERY_LENGTH));
        assert_eq!(check(&long).reason, "SQL query too long");
    }

    #[test]
    fn test_plain_statements_pass() {
        let verdict = check("SHOW DATABASES");
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, "Query validation passed");
        assert!(check("DESCRIBE lake.incidents").allowed);
    }

    #[test]
    fn test_empty_query_denied() {
        assert!(!check("   ").allowed);
    }

    #[test]
    fn test_is_select() {
        assert!(is_select("  SELECT 1"));
        assert!(is_select("selectx"));
        assert!(!is_select("SHOW TABLES"));
        assert!(!is_select("sel"));
    }
}
