//! Identifiers and literals from rules documents never reach SQL unescaped.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use whistle_guard::backend::{CheckBackend, InMemoryBackend};
use whistle_guard::core::{Operator, RegexType, TableCheckSuite};
use whistle_guard::security::SqlSecurity;

fn backend() -> Arc<InMemoryBackend> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("we\"ird", DataType::Int64, false),
        Field::new("note", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 2])),
            Arc::new(StringArray::from(vec!["it's", "fine", "ok"])),
        ],
    )
    .unwrap();
    Arc::new(InMemoryBackend::from_batches(schema, vec![batch]).unwrap())
}

#[tokio::test]
async fn test_quoted_column_names_are_escaped() {
    let backend = backend();
    let outcome = backend
        .check_count_distinct("we\"ird", 2, &Operator::Equal)
        .await
        .unwrap();
    assert!(outcome.passed);

    let outcome = backend.check_no_duplicates("we\"ird").await.unwrap();
    assert_eq!(outcome.message, "column we\"ird want 0 duplicate rows, got 1");
}

#[tokio::test]
async fn test_injection_attempt_is_just_a_missing_column() {
    let mut suite = TableCheckSuite::new(backend());
    suite.add_column("note\"; DROP TABLE data; --", "string").allow_nulls = false;

    suite.run_checks().await.unwrap();
    assert_eq!(suite.error_messages.len(), 1);
    assert!(suite.error_messages[0].contains("not found"));

    // The table is still there.
    let outcome = backend().check_row_count(3, &Operator::Equal).await.unwrap();
    assert!(outcome.passed);
}

#[tokio::test]
async fn test_regex_with_quotes() {
    let outcome = backend()
        .check_regex("note", Some("'s$"), Some(RegexType::Exclude))
        .await
        .unwrap();
    assert_eq!(outcome.message, "column note found invalid regex 's with rule 's$");
}

#[test]
fn test_table_name_validation() {
    for name in [
        "users; DROP TABLE users",
        "test' UNION SELECT * FROM users --",
        "test--comment",
        "test/*comment*/",
        "a b",
        "",
    ] {
        assert!(SqlSecurity::validate_table_name(name).is_err(), "{name}");
    }
    for name in ["users", "my-project.sales.orders", "_staging_2024"] {
        assert!(SqlSecurity::validate_table_name(name).is_ok(), "{name}");
    }
}

#[test]
fn test_oversized_regex_rejected() {
    let pattern = "a".repeat(1001);
    assert!(SqlSecurity::validate_regex_pattern(&pattern).is_err());
    assert_eq!(
        SqlSecurity::validate_regex_pattern("it's").unwrap(),
        "it\\'s"
    );
}
