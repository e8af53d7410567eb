//! Query security pipeline.
//!
//! - [`QuerySyntaxValidator`]: keyword and structure rules
//! - [`InjectionDetector`]: injection heuristics with matched signals
//! - [`IdentifierValidator`]: database/table name rules
//! - [`ResultMasker`]: redaction of sensitive-looking output
//! - [`RateLimiter`] and [`SessionTokenStore`]: per-caller state
//!
//! Validation is pattern based and runs before any database round trip.

pub mod identifier;
pub mod injection;
pub mod masking;
pub mod rate_limit;
pub mod session;
pub mod syntax;

pub use identifier::{IdentifierKind, IdentifierValidator};
pub use injection::{InjectionDetector, InjectionReport};
pub use masking::ResultMasker;
pub use rate_limit::RateLimiter;
pub use session::{SessionStats, SessionTokenStore};
pub use syntax::QuerySyntaxValidator;

use crate::error::{DbError, DbResult};
use serde::Serialize;
use tracing::warn;

/// Allow/deny outcome of a security check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub allowed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_patterns: Vec<String>,
}

impl ValidationVerdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            matched_patterns: Vec::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            matched_patterns: Vec::new(),
        }
    }

    pub fn deny_with_patterns(reason: impl Into<String>, matched_patterns: Vec<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            matched_patterns,
        }
    }

    /// Convert a denial into [`DbError::ValidationDenied`].
    pub fn into_result(self) -> DbResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(DbError::validation_denied(self.reason, self.matched_patterns))
        }
    }
}

/// The three stateless validators behind one entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityGate {
    syntax: QuerySyntaxValidator,
    injection: InjectionDetector,
    identifiers: IdentifierValidator,
}

impl SecurityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_sql_query(&self, query: &str) -> ValidationVerdict {
        self.syntax.validate(query)
    }

    pub fn detect_injection(&self, query: &str) -> InjectionReport {
        self.injection.detect(query)
    }

    pub fn validate_identifier(&self, kind: IdentifierKind, name: &str) -> ValidationVerdict {
        self.identifiers.validate(kind, name)
    }

    /// Syntax rules, then injection heuristics. The first failure wins.
    pub fn check_query(&self, query: &str) -> ValidationVerdict {
        let verdict = self.validate_sql_query(query);
        if !verdict.allowed {
            warn!(reason = %verdict.reason, "Query failed syntax validation");
            return verdict;
        }

        let report = self.detect_injection(query);
        if report.detected {
            return ValidationVerdict::deny_with_patterns(
                "Potential SQL injection detected",
                report.matched_patterns,
            );
        }
        verdict
    }

    pub fn check_identifier(&self, kind: IdentifierKind, name: &str) -> ValidationVerdict {
        let verdict = self.validate_identifier(kind, name);
        if !verdict.allowed {
            warn!(?kind, name, reason = %verdict.reason, "Identifier rejected");
        }
        verdict
    }
}

const UNSAFE_CHARS: &[char] = &[
    '<', '>', '"', '\'', '&', ';', '|', '`', '$', '(', ')', '{', '}',
];

/// Strip shell/markup metacharacters and collapse whitespace.
pub fn sanitize_input(input: &str) -> String {
    input
        .replace(UNSAFE_CHARS, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
