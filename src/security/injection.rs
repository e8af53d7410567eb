//! Pattern-based SQL injection heuristics.
//!
//! Any match counts as a positive detection. The matched fragments are
//! returned so they can be logged and reported back to the caller.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::warn;

use super::syntax::is_select;

const INJECTION_PATTERNS: &[&str] = &[
    r"\b(insert|update|delete|drop|create|alter|exec|execute)\b",
    r"(--|#|/\*|\*/)",
    r"\b(and|or)\b\s+\d+\s*=\s*\d+",
    r#"\b(and|or)\b\s+['"][^'"]*['"]"#,
    r#"\b(and|or)\b\s+\d+\s*=\s*['"][^'"]*['"]"#,
    r"\bunion\b\s+\b(all|distinct)\b",
    r"\bunion\b\s+\binto\b",
    r"\bunion\b\s+\b(where|group|order|having|limit)\b",
    r"\bunion\b\s+\b(and|or|not)\b",
    r"\bunion\b\s+\b(like|in|between|exists)\b",
    r"\bunion\b\s+\b(count|sum|avg|min|max)\b",
    r"\bunion\b\s+\b(distinct|top|limit|offset)\b",
    r"\bunion\b\s+\b(case|when|then|else|end)\b",
    r"\bunion\b\s+\b(if|elseif|else|endif)\b",
    r"\bunion\b\s+\b(while|for|loop|repeat|until)\b",
    r"\bunion\b\s+\b(break|continue|return|exit)\b",
    r"\bunion\b\s+\b(declare|set|begin|end)\b",
    r"\bunion\b\s+\b(procedure|function|trigger|event)\b",
    r"\bunion\b\s+\b(transaction|commit|rollback)\b",
    r"\bunion\b\s+\b(lock|unlock|grant|revoke)\b",
];

static COMPILED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    INJECTION_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("static injection pattern"))
        .collect()
});

/// Result of an injection scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectionReport {
    pub detected: bool,
    pub matched_patterns: Vec<String>,
}

/// Scans non-SELECT statements for injection signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectionDetector;

impl InjectionDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, query: &str) -> InjectionReport {
        if query.trim().is_empty() || is_select(query) {
            return InjectionReport::default();
        }

        let lowered = query.to_lowercase();
        let matched_patterns: Vec<String> = COMPILED
            .iter()
            .flat_map(|re| re.find_iter(&lowered).map(|m| m.as_str().to_string()))
            .collect();

        if matched_patterns.is_empty() {
            return InjectionReport::default();
        }

        warn!(matched = ?matched_patterns, "Potential SQL injection detected");
        InjectionReport {
            detected: true,
            matched_patterns,
        }
    }

    /// Shorthand for `!detect(query).detected`.
    pub fn is_safe(&self, query: &str) -> bool {
        !self.detect(query).detected
    }
}
