//! Generic database tools: listing, schema inspection and ad-hoc SELECTs.
//!
//! The functions here only build statements and screen arguments; the
//! [`ToolHandler`](super::ToolHandler) runs them through the security gate
//! and the executor.

use crate::security::ValidationVerdict;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::LazyLock;

/// Statements `execute_query` refuses outright, matched as whole words.
pub const READ_ONLY_FORBIDDEN: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE",
];

static FORBIDDEN_RE: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    READ_ONLY_FORBIDDEN
        .iter()
        .map(|kw| {
            let re = Regex::new(&format!(r"\b{}\b", regex::escape(kw)))
                .expect("static keyword pattern");
            (*kw, re)
        })
        .collect()
});

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database to list tables from (e.g. "lake")
    pub database: String,
}

/// Input for the get_table_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTableSchemaInput {
    /// Database containing the table
    pub database: String,
    /// Table to describe
    pub table: String,
}

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// SQL SELECT statement to execute. Write and DDL statements are rejected.
    pub query: String,
    /// Maximum rows to return. Default: 100, max: 1000
    #[serde(default)]
    pub limit: Option<u32>,
}

pub const LIST_DATABASES_SQL: &str = "SHOW DATABASES";

/// `database` must already have passed identifier validation.
pub fn list_tables_sql(database: &str) -> String {
    format!("SHOW TABLES FROM `{}`", database)
}

/// Both names must already have passed identifier validation.
pub fn table_schema_sql(database: &str, table: &str) -> String {
    format!("DESCRIBE `{}`.`{}`", database, table)
}

/// Read-only screen for ad-hoc queries.
///
/// Runs ahead of the general syntax rules: any forbidden keyword as a whole
/// word (so `created_date` passes but `DROP` does not), then a leading SELECT.
pub fn screen_read_only(query: &str) -> ValidationVerdict {
    let upper = query.trim().to_uppercase();
    if upper.is_empty() {
        return ValidationVerdict::deny("Query is required");
    }

    if let Some((keyword, _)) = FORBIDDEN_RE.iter().find(|(_, re)| re.is_match(&upper)) {
        return ValidationVerdict::deny(format!(
            "Query contains dangerous keyword '{}'. Only SELECT queries are allowed for security reasons.",
            keyword
        ));
    }

    if !upper.starts_with("SELECT") {
        return ValidationVerdict::deny(
            "Query must start with SELECT for security reasons. Only read operations are allowed.",
        );
    }

    ValidationVerdict::allow("Read-only query")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_keywords() {
        assert!(screen_read_only("SELECT created_date, updated_date FROM lake.incidents").allowed);
        assert!(screen_read_only("select * from deleted_items").allowed);

        let verdict = screen_read_only("SELECT 1; DROP TABLE users");
        assert!(!verdict.allowed);
        assert_eq!(
            verdict.reason,
            "Query contains dangerous keyword 'DROP'. Only SELECT queries are allowed for security reasons."
        );
    }

    #[test]
    fn test_keyword_order_reported() {
        // First forbidden keyword in list order, not in query order
        let verdict = screen_read_only("insert into t select * from x where 1 = 1 -- drop");
        assert!(verdict.reason.contains("'DROP'"));
    }

    #[test]
    fn test_must_start_with_select() {
        let verdict = screen_read_only("SHOW DATABASES");
        assert!(!verdict.allowed);
        assert!(verdict.reason.starts_with("Query must start with SELECT"));
        assert!(screen_read_only("  \n select 1").allowed);
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(screen_read_only("   ").reason, "Query is required");
    }

    #[test]
    fn test_statement_builders() {
        assert_eq!(list_tables_sql("lake"), "SHOW TABLES FROM `lake`");
        assert_eq!(table_schema_sql("lake", "incidents"), "DESCRIBE `lake`.`incidents`");
    }
}
