//! Redaction of sensitive-looking substrings in query results.
//!
//! Masking is syntactic: every string leaf is scanned regardless of the
//! column it came from. Redaction tokens contain no letters or digits, so
//! masking an already-masked value leaves it unchanged.

use crate::models::Row;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::LazyLock;

pub const EMAIL_TOKEN: &str = "***@***";
pub const SSN_TOKEN: &str = "***-**-****";
pub const CREDIT_CARD_TOKEN: &str = "****-****-****-****";
pub const PHONE_TOKEN: &str = "***-***-****";
pub const IP_TOKEN: &str = "***.***.***.***";

/// Applied in order; longer numeric shapes go before the shorter ones they contain.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            EMAIL_TOKEN,
        ),
        (r"\b\d{3}-\d{2}-\d{4}\b", SSN_TOKEN),
        (r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b", CREDIT_CARD_TOKEN),
        (r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", PHONE_TOKEN),
        (r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b", IP_TOKEN),
    ]
    .into_iter()
    .map(|(pattern, token)| (Regex::new(pattern).expect("static masking pattern"), token))
    .collect()
});

/// Post-processor for result data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMasker;

impl ResultMasker {
    pub fn new() -> Self {
        Self
    }

    /// Mask a single string.
    pub fn mask_text(&self, text: &str) -> String {
        RULES.iter().fold(text.to_string(), |acc, (re, token)| {
            re.replace_all(&acc, *token).into_owned()
        })
    }

    /// Mask every string leaf, preserving structure.
    pub fn mask(&self, value: JsonValue) -> JsonValue {
        match value {
            JsonValue::String(s) => JsonValue::String(self.mask_text(&s)),
            JsonValue::Array(items) => {
                JsonValue::Array(items.into_iter().map(|v| self.mask(v)).collect())
            }
            JsonValue::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.mask(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Mask every value of a result row. Column names are left alone.
    pub fn mask_row(&self, row: Row) -> Row {
        row.into_iter().map(|(k, v)| (k, self.mask(v))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_each_category() {
        let masker = ResultMasker::new();
        assert_eq!(masker.mask_text("mail alice@example.com now"), "mail ***@*** now");
        assert_eq!(masker.mask_text("ssn 123-45-6789"), "ssn ***-**-****");
        assert_eq!(
            masker.mask_text("card 4111 1111 1111 1111"),
            "card ****-****-****-****"
        );
        assert_eq!(masker.mask_text("call 555-123-4567"), "call ***-***-****");
        assert_eq!(masker.mask_text("from 10.0.12.7"), "from ***.***.***.***");
    }

    #[test]
    fn test_structure_preserved() {
        let masker = ResultMasker::new();
        let value = json!([
            {"reporter": "bob@corp.io", "count": 3, "ok": true, "tags": ["192.168.1.1", null]}
        ]);
        assert_eq!(
            masker.mask(value),
            json!([
                {"reporter": "***@***", "count": 3, "ok": true, "tags": ["***.***.***.***", null]}
            ])
        );
    }

    #[test]
    fn test_masking_is_idempotent() {
        let masker = ResultMasker::new();
        let value = json!({
            "text": "a@b.com 123-45-6789 4111-1111-1111-1111 555.123.4567 8.8.8.8",
        });
        let once = masker.mask(value);
        let twice = masker.mask(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mask_row_keeps_column_names() {
        let masker = ResultMasker::new();
        let mut row = Row::new();
        row.insert("reporter_email".into(), json!("dev@konflux.dev"));
        row.insert("lead_time_minutes".into(), json!(42));
        let masked = masker.mask_row(row);
        assert_eq!(masked.keys().collect::<Vec<_>>(), ["reporter_email", "lead_time_minutes"]);
        assert_eq!(masked["reporter_email"], "***@***");
    }

    #[test]
    fn test_plain_text_untouched() {
        let masker = ResultMasker::new();
        assert_eq!(masker.mask_text("deployment 42 finished"), "deployment 42 finished");
        assert_eq!(masker.mask(json!(12345)), json!(12345));
    }
}
