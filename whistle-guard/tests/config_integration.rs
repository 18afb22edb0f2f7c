//! Rules documents applied to suites and run end to end.

mod common;

use common::five_row_backend;
use std::io::Write;
use whistle_guard::config::{load_rules_file, parse_rules_str, RulesError};
use whistle_guard::core::{ColumnType, RegexType, TableCheckSuite};
use whistle_guard::error::WhistleError;

fn apply(text: &str) -> Result<TableCheckSuite, WhistleError> {
    let mut suite = TableCheckSuite::new(five_row_backend());
    let document = parse_rules_str(text, "inline")?;
    suite.apply_rules(&document)?;
    Ok(suite)
}

#[test]
fn test_document_reproduces_fields() {
    let suite = apply(
        "table:
  stop_on_fail: \"True\"
  allow_duplicate_rows: 0
  row_count_min: 1
columns:
  - name: A
    type: numeric
    min: 0
    max: 5
    count_distinct: 5
    allow_outliers: false
  - name: B
    type: string
    regex_rule: \"^[a-z]+$\"
    regex_type: mandatory
",
    )
    .unwrap();

    assert!(suite.stop_on_fail);
    assert!(!suite.allow_duplicate_rows);
    assert_eq!(suite.row_count_min, Some(1));

    let a = suite.column("A").unwrap();
    assert_eq!(a.column_type, ColumnType::Numeric);
    assert_eq!(a.min_val, Some(0.0));
    assert_eq!(a.max_val, Some(5.0));
    assert_eq!(a.count_distinct, Some(5));
    assert!(!a.allow_outliers);

    let b = suite.column("B").unwrap();
    assert_eq!(b.regex_rule.as_deref(), Some("^[a-z]+$"));
    assert_eq!(b.regex_type, Some(RegexType::Mandatory));
}

#[tokio::test]
async fn test_document_drives_run() {
    let mut suite = apply(
        "dataset:
  row_count_max: 3
columns:
  - name: A
    type: numeric
    allow_duplicates: false
  - name: B
    type: string
    allow_blanks: \"false\"
",
    )
    .unwrap();

    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec![
            "want row count <= 3, got 5",
            "column A want 0 duplicate rows, got 3",
            "column B has blanks or whitespace only values",
        ]
    );
}

#[test]
fn test_configuration_errors_name_the_key() {
    let err = apply("columns:\n  - name: A\n    type: numeric\n    allow_nul: false\n").unwrap_err();
    assert!(err.is_rules_error());
    assert_eq!(err.to_string(), "column A: unexpected column attribute: allow_nul");

    let err = apply("table:\n  row_count_max: lots\n").unwrap_err();
    assert_eq!(err.to_string(), "table: row_count_max want an integer, got lots");

    let err = apply("columns:\n  - name: A\n    type: numeric\n    allow_nulls: maybe\n")
        .unwrap_err();
    assert_eq!(err.to_string(), "column A allow_nulls: want boolean value, got maybe");

    let err = apply("columns:\n  - name: A\n").unwrap_err();
    assert_eq!(err.to_string(), "column A: column type missing");
}

#[test]
fn test_load_rules_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "columns:\n  - name: A\n    type: numeric").unwrap();
    file.flush().unwrap();

    let document = load_rules_file(file.path()).unwrap();
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.apply_rules(&document).unwrap();
    assert_eq!(suite.columns().len(), 1);

    let err = load_rules_file("/no/such/rules.yaml").unwrap_err();
    assert!(matches!(err, WhistleError::Io(_)));
}

#[test]
fn test_non_mapping_file_is_named() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "- just\n- a list").unwrap();
    file.flush().unwrap();

    let err = load_rules_file(file.path()).unwrap_err();
    match err {
        WhistleError::Rules(RulesError::NotAMapping { file: name }) => {
            assert_eq!(name, file.path().display().to_string());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
