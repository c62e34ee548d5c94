//! Storage layer (Arrow/Parquet)
//!
//! Reference tables are read whole into memory as Arrow record batches and
//! then projected column by column into typed vectors. Columns are cast to
//! the requested logical type first, so integer ids read as strings and
//! `Date32`/string timestamps read as UTC instants.
//!
//! Toyota Way Principles:
//! - Poka-Yoke: a missing column is a typed error naming table and column
//! - Jidoka: cast failures stop the load instead of producing partial rows

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, TimeUnit, TimestampMicrosecondType};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::path::Path;

/// In-memory Arrow table with typed column accessors
#[derive(Debug, Clone)]
pub struct StorageEngine {
    table: String,
    batches: Vec<RecordBatch>,
}

impl StorageEngine {
    /// Create a storage engine from existing batches
    ///
    /// Useful for testing and benchmarking
    #[must_use]
    pub fn new(table: impl Into<String>, batches: Vec<RecordBatch>) -> Self {
        Self {
            table: table.into(),
            batches,
        }
    }

    /// Load table from Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(table: impl Into<String>, path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let table = table.into();
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::DataSource(format!("Failed to open {table} at {}: {e}", path.display()))
        })?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|builder| builder.build())
            .map_err(|e| Error::DataSource(format!("Failed to read {table} Parquet file: {e}")))?;

        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::DataSource(format!("Failed to read {table} record batch: {e}")))?;

        tracing::debug!(table = %table, batches = batches.len(), "loaded parquet table");
        Ok(Self { table, batches })
    }

    /// Total row count
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Column as optional strings
    ///
    /// # Errors
    ///
    /// Returns error if the column is missing or cannot be cast to text
    pub fn strings(&self, column: &str) -> Result<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = self.cast_column(batch, column, &DataType::Utf8)?;
            let values = array
                .as_string_opt::<i32>()
                .ok_or_else(|| self.type_error(column, "Utf8"))?;
            out.extend(values.iter().map(|v| v.map(str::to_string)));
        }
        Ok(out)
    }

    /// Column as optional floats
    ///
    /// # Errors
    ///
    /// Returns error if the column is missing or not numeric
    pub fn floats(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let mut out = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = self.cast_column(batch, column, &DataType::Float64)?;
            let values = array
                .as_primitive_opt::<Float64Type>()
                .ok_or_else(|| self.type_error(column, "Float64"))?;
            out.extend(values.iter());
        }
        Ok(out)
    }

    /// Column as optional UTC timestamps
    ///
    /// # Errors
    ///
    /// Returns error if the column is missing or not a date/time
    pub fn timestamps(&self, column: &str) -> Result<Vec<Option<DateTime<Utc>>>> {
        let target = DataType::Timestamp(TimeUnit::Microsecond, None);
        let mut out = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = self.cast_column(batch, column, &target)?;
            let values = array
                .as_primitive_opt::<TimestampMicrosecondType>()
                .ok_or_else(|| self.type_error(column, "Timestamp"))?;
            out.extend(
                values
                    .iter()
                    .map(|v| v.and_then(DateTime::<Utc>::from_timestamp_micros)),
            );
        }
        Ok(out)
    }

    fn cast_column(&self, batch: &RecordBatch, column: &str, to: &DataType) -> Result<ArrayRef> {
        let array = batch
            .column_by_name(column)
            .ok_or_else(|| Error::MissingColumn {
                table: self.table.clone(),
                column: column.to_string(),
            })?;
        if array.data_type() == to {
            return Ok(array.clone());
        }
        Ok(cast(array, to)?)
    }

    fn type_error(&self, column: &str, expected: &str) -> Error {
        Error::DataSource(format!(
            "Column '{column}' of {} could not be read as {expected}",
            self.table
        ))
    }
}
