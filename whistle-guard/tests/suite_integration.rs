//! End-to-end suite runs against the in-memory backend.

mod common;

use common::{five_row_backend, int_backend};
use whistle_guard::core::{RegexType, TableCheckSuite};

#[tokio::test]
async fn test_no_active_rules_yields_no_messages() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.add_column("A", "numeric");
    suite.add_column("B", "string");
    suite.add_column("C", "numeric");
    suite.add_column("D", "datetime");

    suite.run_checks().await.unwrap();
    assert!(suite.passed());
    assert!(suite.error_messages.is_empty());
}

#[tokio::test]
async fn test_row_count_bounds() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.add_column("A", "numeric");

    suite.row_count_max = Some(10);
    suite.run_checks().await.unwrap();
    assert!(suite.error_messages.is_empty());

    suite.row_count_max = Some(3);
    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages, vec!["want row count <= 3, got 5"]);

    suite.row_count_max = None;
    suite.row_count_min = Some(6);
    suite.row_count = Some(4);
    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec!["want row count >= 6, got 5", "want row count == 4, got 5"]
    );
}

#[tokio::test]
async fn test_missing_column_yields_one_message() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    let column = suite.add_column("Z", "numeric");
    column.allow_nulls = false;
    column.allow_duplicates = false;
    column.count_distinct = Some(3);
    column.min_val = Some(0.0);

    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages, vec!["column Z not found in data"]);
}

#[tokio::test]
async fn test_blanks_in_string_column() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.add_column("B", "string").allow_blanks = false;

    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages.len(), 1);
    assert!(suite.error_messages[0].contains("blanks"));
}

#[tokio::test]
async fn test_duplicates_and_count_distinct() {
    let backend = int_backend("A", vec![1, 1, 4, 4, 4]);

    let mut suite = TableCheckSuite::new(backend.clone());
    suite.add_column("A", "numeric").allow_duplicates = false;
    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages, vec!["column A want 0 duplicate rows, got 3"]);

    let mut suite = TableCheckSuite::new(backend.clone());
    suite.add_column("A", "numeric").count_distinct = Some(2);
    suite.run_checks().await.unwrap();
    assert!(suite.error_messages.is_empty());

    let mut suite = TableCheckSuite::new(backend);
    suite.add_column("A", "numeric").count_distinct = Some(3);
    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages.len(), 1);
    assert!(suite.error_messages[0].contains("got 2"));
}

#[tokio::test]
async fn test_stop_on_fail_at_table_level() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.stop_on_fail = true;
    suite.row_count_max = Some(3);
    suite.row_count_min = Some(10);
    suite.add_column("A", "numeric").allow_duplicates = false;

    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages, vec!["want row count <= 3, got 5"]);

    suite.stop_on_fail = false;
    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages.len(), 3);
}

#[tokio::test]
async fn test_stop_on_fail_across_columns() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.stop_on_fail = true;
    let a = suite.add_column("A", "numeric");
    a.allow_duplicates = false;
    a.count_distinct = Some(5);
    suite.add_column("B", "string").allow_blanks = false;

    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages, vec!["column A want 0 duplicate rows, got 3"]);

    suite.stop_on_fail = false;
    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages.len(), 3);
}

#[tokio::test]
async fn test_value_and_null_rules() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    let a = suite.add_column("A", "numeric");
    a.min_val = Some(1.0);
    a.max_val = Some(3.0);
    suite.add_column("C", "numeric").allow_nulls = false;

    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec![
            "column A want value <= 3, got 4",
            "column C want 0 nulls, got 1",
        ]
    );
}

#[tokio::test]
async fn test_rules_gated_by_column_type() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    let b = suite.add_column("B", "string");
    b.allow_outliers = false;
    b.min_val = Some(0.0);
    suite.add_column("A", "numeric").allow_blanks = false;

    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec![
            "column B cannot check inter-quartile range on a non-numeric column",
            "column B cannot check minimum value on a non-numeric column",
            "column A cannot check for blanks in non-string column",
        ]
    );
}

#[tokio::test]
async fn test_wrong_declared_type() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.add_column("B", "numeric");
    suite.add_column("A", "string");
    suite.add_column("A", "decimal");

    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec![
            "column B expected to be numeric but is not",
            "column A expected to be string type but is not",
            "column A could not be tested for type decimal (unknown type)",
        ]
    );
}

#[tokio::test]
async fn test_datetime_column_with_format() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.add_column("D", "datetime").date_format = Some("%Y-%m-%d".to_string());
    suite.run_checks().await.unwrap();
    assert!(suite.error_messages.is_empty());

    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.add_column("D", "datetime").date_format = Some("%d/%m/%Y".to_string());
    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec!["column D data does not match datetime format %d/%m/%Y"]
    );
}

#[tokio::test]
async fn test_regex_rules() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    let b = suite.add_column("B", "string");
    b.regex_rule = Some("[a-z]".to_string());
    b.regex_type = Some(RegexType::Mandatory);

    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec!["column B found a non matching regex record with rule [a-z]"]
    );

    let b = suite.column_mut("B").unwrap();
    b.regex_rule = Some("rr".to_string());
    b.regex_type = Some(RegexType::Exclude);
    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec!["column B found invalid regex rr with rule rr"]
    );

    let b = suite.column_mut("B").unwrap();
    b.regex_type = None;
    suite.run_checks().await.unwrap();
    assert_eq!(
        suite.error_messages,
        vec!["column B None regex_rule or regex_type"]
    );
}

#[tokio::test]
async fn test_rerun_replaces_messages() {
    let mut suite = TableCheckSuite::new(five_row_backend());
    suite.row_count = Some(4);
    suite.run_checks().await.unwrap();
    assert!(!suite.passed());

    suite.row_count = Some(5);
    suite.run_checks().await.unwrap();
    assert!(suite.passed());
}
