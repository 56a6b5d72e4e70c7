//! Column type inference and the schema descriptor written beside each
//! export.

use serde::Serialize;
use serde_json::Value;

use super::QueryExport;
use crate::cache::Row;

/// Inferred column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// No non-null value observed.
    Null,
    Bool,
    Int64,
    Float64,
    String,
    /// Nested arrays or objects, stored as JSON text.
    Json,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Json => "json",
        }
    }

    /// Type of a single value, `None` for JSON null.
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Bool),
            Value::Number(n) if n.is_i64() => Some(Self::Int64),
            // u64 beyond i64::MAX and all fractional numbers.
            Value::Number(_) => Some(Self::Float64),
            Value::String(_) => Some(Self::String),
            Value::Array(_) | Value::Object(_) => Some(Self::Json),
        }
    }

    /// Least type that holds values of both `self` and `other`.
    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Null, b) => b,
            (a, Self::Null) => a,
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Self::Float64,
            _ => Self::String,
        }
    }
}

/// One column of the aggregated dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// True if any row lacks the column or holds null in it.
    pub nullable: bool,
}

/// Infer columns over `rows`, in first-seen order.
pub fn infer_columns(rows: &[Row]) -> Vec<ColumnSchema> {
    let mut columns: Vec<ColumnSchema> = Vec::new();
    let mut index: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for row in rows {
        for (name, value) in row {
            let slot = *index.entry(name.as_str()).or_insert_with(|| {
                columns.push(ColumnSchema {
                    name: name.clone(),
                    column_type: ColumnType::Null,
                    nullable: false,
                });
                columns.len() - 1
            });
            let column = &mut columns[slot];
            match ColumnType::of(value) {
                Some(t) => column.column_type = column.column_type.widen(t),
                None => column.nullable = true,
            }
        }
    }

    for column in &mut columns {
        if column.column_type == ColumnType::Null
            || rows.iter().any(|row| !row.contains_key(&column.name))
        {
            column.nullable = true;
        }
    }
    columns
}

/// Usage notes embedded in every descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationNotes {
    pub recommended_format: String,
    pub notes: Vec<String>,
}

impl Default for IntegrationNotes {
    fn default() -> Self {
        Self {
            recommended_format: "parquet".into(),
            notes: vec![
                "Columns prefixed with '_' are tracking metadata added at export".into(),
                "Each row carries its query name, query id, fetch time and export time".into(),
                "Parquet is recommended for large datasets; CSV is for quick inspection".into(),
            ],
        }
    }
}

/// JSON metadata file written beside each export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub dataset_name: String,
    pub description: String,
    pub export_timestamp: String,
    pub total_rows: usize,
    pub columns: Vec<ColumnSchema>,
    pub queries: Vec<QueryExport>,
    pub integration: IntegrationNotes,
}
