//! Columnar (Parquet) and delimited-text (CSV) writers.
//!
//! Both go through one Arrow `RecordBatch` built from the inferred columns.
//! Without the `export` feature the writers report the capability as
//! unavailable.

use std::path::Path;

use super::ExportError;
use super::schema::ColumnSchema;
use crate::cache::Row;

#[cfg(feature = "export")]
mod arrow_impl {
    use std::fs::File;
    use std::path::Path;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use parquet::basic::Compression;
    use parquet::file::properties::WriterProperties;
    use serde_json::Value;

    use super::super::ExportError;
    use super::super::schema::{ColumnSchema, ColumnType};
    use crate::cache::Row;

    fn data_type(t: ColumnType) -> DataType {
        match t {
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Null | ColumnType::String | ColumnType::Json => DataType::Utf8,
        }
    }

    fn text(value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn column_array(rows: &[Row], column: &ColumnSchema) -> ArrayRef {
        let values = rows.iter().map(|row| row.get(&column.name));
        match column.column_type {
            ColumnType::Bool => Arc::new(
                values
                    .map(|v| v.and_then(Value::as_bool))
                    .collect::<BooleanArray>(),
            ),
            ColumnType::Int64 => Arc::new(
                values
                    .map(|v| v.and_then(Value::as_i64))
                    .collect::<Int64Array>(),
            ),
            ColumnType::Float64 => Arc::new(
                values
                    .map(|v| v.and_then(Value::as_f64))
                    .collect::<Float64Array>(),
            ),
            ColumnType::Null | ColumnType::String | ColumnType::Json => Arc::new(
                values
                    .map(|v| v.and_then(text))
                    .collect::<StringArray>(),
            ),
        }
    }

    pub(super) fn record_batch(
        rows: &[Row],
        columns: &[ColumnSchema],
    ) -> Result<RecordBatch, ExportError> {
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|c| Field::new(&c.name, data_type(c.column_type), c.nullable))
                .collect::<Vec<_>>(),
        ));
        let arrays = columns.iter().map(|c| column_array(rows, c)).collect();
        RecordBatch::try_new(schema, arrays).map_err(|e| ExportError::Arrow(e.to_string()))
    }

    pub(super) fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<(), ExportError> {
        let file = File::create(path).map_err(|e| ExportError::Io(e.to_string()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .map_err(|e| ExportError::Parquet(e.to_string()))?;
        writer
            .write(batch)
            .map_err(|e| ExportError::Parquet(e.to_string()))?;
        writer
            .close()
            .map_err(|e| ExportError::Parquet(e.to_string()))?;
        Ok(())
    }

    pub(super) fn write_csv(path: &Path, batch: &RecordBatch) -> Result<(), ExportError> {
        let file = File::create(path).map_err(|e| ExportError::Io(e.to_string()))?;
        let mut writer = arrow::csv::WriterBuilder::new()
            .with_header(true)
            .build(file);
        writer
            .write(batch)
            .map_err(|e| ExportError::Arrow(e.to_string()))
    }
}

/// Whether tabular export support is compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportCapability {
    available: bool,
}

impl ExportCapability {
    /// Resolve the capability of this build.
    pub fn detect() -> Self {
        Self {
            available: cfg!(feature = "export"),
        }
    }

    /// A capability that refuses every export.
    pub fn unavailable() -> Self {
        Self { available: false }
    }

    pub(crate) fn ensure(&self) -> Result<(), ExportError> {
        if self.available {
            Ok(())
        } else {
            Err(ExportError::CapabilityUnavailable)
        }
    }
}

/// Target files of one export run.
pub(crate) struct TabularTargets<'a> {
    pub columnar: Option<&'a Path>,
    pub text: Option<&'a Path>,
}

/// Write `rows` to every requested target.
#[cfg(feature = "export")]
pub(crate) fn write_tabular(
    rows: &[Row],
    columns: &[ColumnSchema],
    targets: &TabularTargets<'_>,
) -> Result<(), ExportError> {
    let batch = arrow_impl::record_batch(rows, columns)?;
    if let Some(path) = targets.columnar {
        arrow_impl::write_parquet(path, &batch)?;
    }
    if let Some(path) = targets.text {
        arrow_impl::write_csv(path, &batch)?;
    }
    Ok(())
}

#[cfg(not(feature = "export"))]
pub(crate) fn write_tabular(
    _rows: &[Row],
    _columns: &[ColumnSchema],
    _targets: &TabularTargets<'_>,
) -> Result<(), ExportError> {
    Err(ExportError::CapabilityUnavailable)
}

#[cfg(all(test, feature = "export"))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::export::schema::infer_columns;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            json!({ "n": 1, "v": 1.5, "tags": ["a"], "name": "x" }),
            json!({ "n": 2, "v": 2, "name": null }),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn record_batch_follows_inferred_columns() {
        let rows = rows();
        let columns = infer_columns(&rows);
        let batch = arrow_impl::record_batch(&rows, &columns).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 4);

        let n = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(n.value(1), 2);
        let v = batch.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(v.value(1), 2.0);
        let tags = batch.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(tags.value(0), r#"["a"]"#);
        assert!(tags.is_null(1));
        let name = batch.column(3).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(name.is_null(1));
    }

    #[test]
    fn writes_both_targets() {
        let dir = tempfile::TempDir::new().unwrap();
        let parquet = dir.path().join("out.parquet");
        let csv = dir.path().join("out.csv");
        let rows = rows();
        let columns = infer_columns(&rows);

        write_tabular(
            &rows,
            &columns,
            &TabularTargets {
                columnar: Some(&parquet),
                text: Some(&csv),
            },
        )
        .unwrap();

        assert!(std::fs::metadata(&parquet).unwrap().len() > 0);
        let text = std::fs::read_to_string(&csv).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("n,v,tags,name"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn unavailable_capability_refuses() {
        assert!(matches!(
            ExportCapability::unavailable().ensure(),
            Err(ExportError::CapabilityUnavailable)
        ));
        assert!(ExportCapability::detect().ensure().is_ok());
    }
}
