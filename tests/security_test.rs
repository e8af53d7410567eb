//! Integration tests for the security gate and result masking.

use devlake_mcp_server::security::{
    IdentifierKind, ResultMasker, SecurityGate, syntax::DANGEROUS_KEYWORDS,
};
use serde_json::json;

#[test]
fn test_select_bypasses_both_checks() {
    let gate = SecurityGate::new();
    for query in [
        "SELECT * FROM lake.incidents",
        "  select 1; drop table users; --",
        "\n\tSeLeCt * FROM t WHERE a = 1 OR 1=1 UNION ALL SELECT password FROM mysql.user",
    ] {
        let verdict = gate.validate_sql_query(query);
        assert!(verdict.allowed, "{query}: {}", verdict.reason);
        let report = gate.detect_injection(query);
        assert!(!report.detected, "{query}");
        assert!(report.matched_patterns.is_empty());
    }
}

#[test]
fn test_every_denylisted_keyword_is_named() {
    let gate = SecurityGate::new();
    for keyword in DANGEROUS_KEYWORDS {
        let query = format!("{} something", keyword.to_uppercase());
        let verdict = gate.validate_sql_query(&query);
        assert!(!verdict.allowed, "{query}");
        assert!(verdict.reason.contains(keyword), "{}", verdict.reason);
    }
}

#[test]
fn test_drop_table_reason() {
    let verdict = SecurityGate::new().validate_sql_query("DROP TABLE x");
    assert!(!verdict.allowed);
    assert_eq!(verdict.reason, "Dangerous SQL keyword detected: drop");
}

#[test]
fn test_structural_patterns() {
    let gate = SecurityGate::new();
    let cases = [
        ("SHOW TABLES;", "trailing statement separator"),
        ("SHOW TABLES -- hidden", "line comment"),
        ("SHOW /* x */ TABLES", "block comment"),
        ("SHOW x UNION SELECT y", "union select"),
        ("CALL exec('rm')", "command execution"),
        ("CALL xp_cmdshell 'dir'", "shell procedure"),
    ];
    for (query, label) in cases {
        let verdict = gate.validate_sql_query(query);
        assert!(!verdict.allowed, "{query}");
        assert_eq!(verdict.reason, format!("Dangerous SQL pattern detected: {label}"));
    }

    assert_eq!(
        gate.validate_sql_query("SHOW TABLES LIKE ('x'").reason,
        "Unbalanced parentheses in SQL query"
    );
    assert_eq!(
        gate.validate_sql_query(&format!("SHOW {}", "x".repeat(10_000))).reason,
        "SQL query too long"
    );
    assert!(gate.validate_sql_query("SHOW DATABASES").allowed);
}

#[test]
fn test_injection_signals_are_reported() {
    let gate = SecurityGate::new();
    let report = gate.detect_injection("SHOW TABLES WHERE name = '' OR 1=1 #");
    assert!(report.detected);
    assert!(report.matched_patterns.iter().any(|p| p.eq_ignore_ascii_case("or 1=1")));
    assert!(report.matched_patterns.iter().any(|p| p == "#"));

    let verdict = gate.check_query("SHOW TABLES WHERE name = '' OR 1=1");
    assert!(!verdict.allowed);
    assert_eq!(verdict.reason, "Potential SQL injection detected");
    assert!(!verdict.matched_patterns.is_empty());
}

#[test]
fn test_identifier_rules() {
    let gate = SecurityGate::new();
    assert!(
        !gate
            .validate_identifier(IdentifierKind::Database, "information_schema")
            .allowed
    );
    assert!(gate.validate_identifier(IdentifierKind::Database, "my_db_1").allowed);

    let verdict = gate.validate_identifier(IdentifierKind::Table, "bad name!");
    assert!(!verdict.allowed);
    assert!(verdict.reason.contains("invalid characters"));
}

#[test]
fn test_verdict_serialization() {
    let verdict = SecurityGate::new().validate_sql_query("SELECT 1");
    assert_eq!(
        serde_json::to_value(&verdict).unwrap(),
        json!({"allowed": true, "reason": "SELECT query allowed"})
    );
}

#[test]
fn test_masking_is_idempotent_on_nested_rows() {
    let masker = ResultMasker::new();
    let rows = json!([
        {
            "assignee": "jane.doe@redhat.com",
            "notes": ["call 555.867.5309", {"ip": "10.1.2.3", "ssn": "078-05-1120"}],
            "card": "4111111111111111",
            "lead_time_minutes": 95,
            "resolved": true
        }
    ]);

    let once = masker.mask(rows);
    assert_eq!(
        once,
        json!([
            {
                "assignee": "***@***",
                "notes": ["call ***-***-****", {"ip": "***.***.***.***", "ssn": "***-**-****"}],
                "card": "****-****-****-****",
                "lead_time_minutes": 95,
                "resolved": true
            }
        ])
    );
    assert_eq!(masker.mask(once.clone()), once);
}
