//! CSV file source.

use super::DataSource;
use crate::backend::{InMemoryBackend, DEFAULT_TABLE_NAME};
use crate::prelude::*;
use arrow::datatypes::{DataType, Field, Schema};
use async_trait::async_trait;
use datafusion::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Options for reading a CSV file.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the file has a header row
    pub has_header: bool,
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Quote character (default: '"')
    pub quote: u8,
    /// Maximum records to read for schema inference
    pub schema_infer_max_records: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            schema_infer_max_records: 1000,
        }
    }
}

/// A single CSV file with an inferred schema.
///
/// Empty fields load as nulls. Column types are inferred from the first
/// [`CsvOptions::schema_infer_max_records`] rows.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    options: CsvOptions,
}

impl CsvSource {
    /// Creates a source for the file at `path` with default options.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: CsvOptions::default(),
        }
    }

    /// Creates a source with custom options.
    pub fn with_options(path: impl Into<PathBuf>, options: CsvOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file into a fresh session and wraps it in a backend.
    pub async fn into_backend(self) -> Result<InMemoryBackend> {
        let ctx = SessionContext::new();
        self.register(&ctx, DEFAULT_TABLE_NAME).await?;
        Ok(InMemoryBackend::new(ctx))
    }

    fn load_error(&self, e: datafusion::error::DataFusionError) -> WhistleError {
        WhistleError::data_source_with_source(
            "CSV",
            format!("failed to load {}", self.path.display()),
            Box::new(e),
        )
    }

    fn path_str(&self) -> Result<&str> {
        self.path.to_str().ok_or_else(|| {
            WhistleError::data_source(
                "CSV",
                format!("path is not valid UTF-8: {}", self.path.display()),
            )
        })
    }
}

#[async_trait]
impl DataSource for CsvSource {
    #[instrument(skip(self, ctx), fields(source.path = %self.path.display()))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        if !self.path.is_file() {
            return Err(WhistleError::data_source(
                "CSV",
                format!("file not found: {}", self.path.display()),
            ));
        }

        let path = self.path_str()?;
        // DataFusion filters listed files by extension, so match whatever the file uses.
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let options = CsvReadOptions::new()
            .has_header(self.options.has_header)
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .schema_infer_max_records(self.options.schema_infer_max_records)
            .file_extension(&extension);

        let inferred = ctx
            .read_csv(path, options.clone())
            .await
            .map_err(|e| self.load_error(e))?;
        let schema = text_temporal_fields(inferred.schema().inner());
        drop(inferred);

        debug!(table.name = %table_name, "Registering CSV table");
        ctx.register_csv(table_name, path, options.schema(&schema))
            .await
            .map_err(|e| self.load_error(e))?;

        info!(table.name = %table_name, "Registered CSV table");
        Ok(())
    }

    fn description(&self) -> String {
        format!("CSV file {}", self.path.display())
    }
}

/// Copies `schema` with every inferred date or timestamp field read back as
/// text. Datetime columns are converted later by the datetime type check, so a
/// date-like column declared as a string stays a string.
fn text_temporal_fields(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
                Field::new(field.name(), DataType::Utf8, true)
            }
            _ => field.as_ref().clone(),
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}
