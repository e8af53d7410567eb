//! Rules for database and table name arguments.

use super::ValidationVerdict;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Maximum identifier length (MySQL limit).
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Database names that may never be targeted.
pub const RESERVED_DATABASES: &[&str] = &[
    "information_schema",
    "mysql",
    "performance_schema",
    "sys",
    "test",
    "tmp",
    "temp",
];

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static identifier pattern"));

/// What an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Database,
    Table,
}

impl IdentifierKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Database => "Database",
            Self::Table => "Table",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierValidator;

impl IdentifierValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, kind: IdentifierKind, name: &str) -> ValidationVerdict {
        let label = kind.label();

        if name.is_empty() {
            return ValidationVerdict::deny(format!("{} name cannot be empty", label));
        }
        if !IDENTIFIER_RE.is_match(name) {
            return ValidationVerdict::deny(format!("{} name contains invalid characters", label));
        }
        if name.len() > MAX_IDENTIFIER_LENGTH {
            return ValidationVerdict::deny(format!("{} name too long", label));
        }
        if kind == IdentifierKind::Database
            && RESERVED_DATABASES.contains(&name.to_lowercase().as_str())
        {
            return ValidationVerdict::deny(format!("Database name '{}' is reserved", name));
        }

        ValidationVerdict::allow(format!("{} name validation passed", label))
    }
}
