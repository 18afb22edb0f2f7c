//! Shared fixtures for integration tests.

#![allow(dead_code)]

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use whistle_guard::backend::{InMemoryBackend, QueryRunner};
use whistle_guard::error::{Result, WhistleError};

/// Five rows: numeric `A` = [1, 1, 4, 4, 4], string `B` with one blank,
/// float `C` with one null, string `D` holding dates.
pub fn five_rows() -> (Arc<Schema>, RecordBatch) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("A", DataType::Int64, false),
        Field::new("B", DataType::Utf8, true),
        Field::new("C", DataType::Float64, true),
        Field::new("D", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 1, 4, 4, 4])),
        Arc::new(StringArray::from(vec![
            Some("apple"),
            Some("banana"),
            Some("  "),
            Some("cherry"),
            Some("date"),
        ])),
        Arc::new(Float64Array::from(vec![
            Some(0.5),
            Some(1.5),
            None,
            Some(2.5),
            Some(3.5),
        ])),
        Arc::new(StringArray::from(vec![
            Some("2024-01-01"),
            Some("2024-02-15"),
            Some("2024-03-31"),
            None,
            Some("2024-12-25"),
        ])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).expect("valid batch");
    (schema, batch)
}

pub fn five_row_backend() -> Arc<InMemoryBackend> {
    let (schema, batch) = five_rows();
    Arc::new(InMemoryBackend::from_batches(schema, vec![batch]).expect("registers table"))
}

/// A table with a single Int64 column.
pub fn int_backend(name: &str, values: Vec<i64>) -> Arc<InMemoryBackend> {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, false)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(values))])
        .expect("valid batch");
    Arc::new(InMemoryBackend::from_batches(schema, vec![batch]).expect("registers table"))
}

/// Answers each query with the output of the first rule whose patterns all
/// occur in the SQL. Unmatched queries fail like a broken client would.
#[derive(Debug, Default)]
pub struct Responder {
    rules: Vec<(Vec<String>, String)>,
    queries: Mutex<Vec<String>>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, patterns: &[&str], output: &str) -> Self {
        let patterns = patterns.iter().map(|p| p.to_string()).collect();
        self.rules.push((patterns, output.to_string()));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryRunner for Responder {
    async fn run(&self, sql: &str) -> Result<String> {
        self.queries.lock().unwrap().push(sql.to_string());
        self.rules
            .iter()
            .find(|(patterns, _)| patterns.iter().all(|p| sql.contains(p.as_str())))
            .map(|(_, output)| output.clone())
            .ok_or_else(|| WhistleError::query("bigquery", format!("unexpected query: {sql}")))
    }
}

pub fn number(n: f64) -> String {
    format!("[{{\"number\":\"{n}\"}}]")
}

pub fn boolean(b: bool) -> String {
    format!("[{{\"bool\":\"{}\"}}]", if b { "True" } else { "False" })
}

pub fn data_type(t: &str) -> String {
    format!("[{{\"string\":\"{t}\"}}]")
}
