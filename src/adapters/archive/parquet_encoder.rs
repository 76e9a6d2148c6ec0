//! Parquet encoding of raw scrape batches.
//!
//! One row per dictionary. Columns are the union of every dictionary's keys
//! in first-seen order. A key missing from a dictionary is a null in that row.
//!
//! Column types are inferred from the non-null values:
//!
//! | values                 | Arrow type |
//! |------------------------|------------|
//! | all integers           | `Int64`    |
//! | numbers, any fractional| `Float64`  |
//! | all booleans           | `Boolean`  |
//! | all strings            | `Utf8`     |
//! | anything else          | `Utf8` holding JSON text |

use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;

use crate::domain::workout::REQUIRED_KEYS;
use crate::ports::ArchivalUploadError;

/// Content type declared on uploaded archives.
pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

/// Encodes a batch of scraped dictionaries as a Parquet file.
///
/// An empty batch produces a valid zero-row file with the scrape columns.
///
/// # Errors
///
/// Returns `ArchivalUploadError::Encoding` if a batch element is not an
/// object or the Arrow/Parquet writers fail.
pub fn encode_batch(batch: &[Value]) -> Result<Vec<u8>, ArchivalUploadError> {
    let record_batch = if batch.is_empty() {
        RecordBatch::new_empty(Arc::new(empty_batch_schema()))
    } else {
        to_record_batch(batch)?
    };
    write_parquet(&record_batch)
}

fn to_record_batch(batch: &[Value]) -> Result<RecordBatch, ArchivalUploadError> {
    let mut rows = Vec::with_capacity(batch.len());
    for (index, value) in batch.iter().enumerate() {
        let object = value.as_object().ok_or_else(|| {
            ArchivalUploadError::Encoding(format!("batch element {} is not an object", index))
        })?;
        rows.push(object);
    }

    let mut columns: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for name in columns {
        let values: Vec<Option<&Value>> = rows
            .iter()
            .map(|row| row.get(name).filter(|v| !v.is_null()))
            .collect();
        let (data_type, array) = build_column(&values);
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| ArchivalUploadError::Encoding(e.to_string()))
}

/// Columns of an empty archive, typed as a scrape would type them.
fn empty_batch_schema() -> Schema {
    let fields = REQUIRED_KEYS
        .iter()
        .map(|key| {
            let data_type = match *key {
                "id" | "duration" | "available" => DataType::Int64,
                _ => DataType::Utf8,
            };
            Field::new(*key, data_type, true)
        })
        .collect::<Vec<_>>();
    Schema::new(fields)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
    Json,
}

fn kind_of(value: &Value) -> ColumnKind {
    match value {
        Value::Number(n) if n.is_i64() => ColumnKind::Int,
        Value::Number(_) => ColumnKind::Float,
        Value::Bool(_) => ColumnKind::Bool,
        Value::String(_) => ColumnKind::Text,
        _ => ColumnKind::Json,
    }
}

fn column_kind(values: &[Option<&Value>]) -> ColumnKind {
    values
        .iter()
        .flatten()
        .map(|v| kind_of(v))
        .reduce(|acc, kind| match (acc, kind) {
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Json,
        })
        // An all-null column has nothing to infer from.
        .unwrap_or(ColumnKind::Text)
}

fn build_column(values: &[Option<&Value>]) -> (DataType, ArrayRef) {
    match column_kind(values) {
        ColumnKind::Int => {
            let array: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            (DataType::Int64, Arc::new(array))
        }
        ColumnKind::Float => {
            let array: Float64Array = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            (DataType::Float64, Arc::new(array))
        }
        ColumnKind::Bool => {
            let array: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            (DataType::Boolean, Arc::new(array))
        }
        ColumnKind::Text => {
            let array: StringArray = values.iter().map(|v| v.and_then(Value::as_str)).collect();
            (DataType::Utf8, Arc::new(array))
        }
        ColumnKind::Json => {
            let array: StringArray = values
                .iter()
                .map(|v| {
                    v.map(|value| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect();
            (DataType::Utf8, Arc::new(array))
        }
    }
}

fn write_parquet(batch: &RecordBatch) -> Result<Vec<u8>, ArchivalUploadError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .map_err(|e| ArchivalUploadError::Encoding(e.to_string()))?;
    writer
        .write(batch)
        .map_err(|e| ArchivalUploadError::Encoding(e.to_string()))?;
    writer
        .close()
        .map_err(|e| ArchivalUploadError::Encoding(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;

    fn read_back(bytes: Vec<u8>) -> (Arc<Schema>, Vec<RecordBatch>) {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes)).unwrap();
        let schema = builder.schema().clone();
        let batches = builder
            .build()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        (schema, batches)
    }

    fn scrape(id: i64, title: &str, available: i64) -> Value {
        json!({
            "id": id,
            "title": title,
            "location": "Gym A",
            "time": "2024-01-01T10:00:00+00:00",
            "duration": 60,
            "available": available,
            "timestamp": "2024-01-01T09:00:00+00:00"
        })
    }

    #[test]
    fn empty_batch_yields_zero_rows_with_scrape_columns() {
        let bytes = encode_batch(&[]).unwrap();
        assert!(bytes.starts_with(b"PAR1"));

        let (schema, batches) = read_back(bytes);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, REQUIRED_KEYS.to_vec());
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 0);
    }

    #[test]
    fn one_row_per_dictionary() {
        let bytes = encode_batch(&[scrape(42, "Yoga", 5), scrape(43, "Spin", 0)]).unwrap();
        let (schema, batches) = read_back(bytes);

        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 2);
        assert_eq!(schema.field_with_name("id").unwrap().data_type(), &DataType::Int64);
        assert_eq!(schema.field_with_name("title").unwrap().data_type(), &DataType::Utf8);

        let titles = batches[0]
            .column(schema.index_of("title").unwrap())
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(titles.value(0), "Yoga");
        assert_eq!(titles.value(1), "Spin");
    }

    #[test]
    fn columns_are_union_of_keys_in_first_seen_order() {
        let batch = vec![json!({"a": 1, "b": "x"}), json!({"c": true, "a": 2})];
        let (schema, batches) = read_back(encode_batch(&batch).unwrap());

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let b = batches[0].column(1);
        assert!(!b.is_null(0));
        assert!(b.is_null(1));
        let c = batches[0].column(2);
        assert!(c.is_null(0));
        assert_eq!(schema.field(2).data_type(), &DataType::Boolean);
    }

    #[test]
    fn scrape_columns_keep_scraper_key_order() {
        let (populated, _) = read_back(encode_batch(&[scrape(42, "Yoga", 5)]).unwrap());
        let (empty, _) = read_back(encode_batch(&[]).unwrap());

        let populated: Vec<&str> = populated.fields().iter().map(|f| f.name().as_str()).collect();
        let empty: Vec<&str> = empty.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(populated, REQUIRED_KEYS.to_vec());
        assert_eq!(populated, empty);
    }

    #[test]
    fn first_seen_order_is_not_alphabetical() {
        let batch = vec![json!({"zone": "A", "available": 3}), json!({"booked": 1})];
        let (schema, _) = read_back(encode_batch(&batch).unwrap());

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["zone", "available", "booked"]);
    }

    #[test]
    fn mixed_int_and_float_widen_to_float() {
        let batch = vec![json!({"n": 1}), json!({"n": 2.5})];
        let (schema, batches) = read_back(encode_batch(&batch).unwrap());

        assert_eq!(schema.field(0).data_type(), &DataType::Float64);
        let n = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(n.value(0), 1.0);
        assert_eq!(n.value(1), 2.5);
    }

    #[test]
    fn mixed_and_nested_values_become_json_text() {
        let batch = vec![json!({"v": 1}), json!({"v": "one"}), json!({"v": {"k": [1]}})];
        let (schema, batches) = read_back(encode_batch(&batch).unwrap());

        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        let v = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(v.value(0), "1");
        assert_eq!(v.value(1), "one");
        assert_eq!(v.value(2), r#"{"k":[1]}"#);
    }

    #[test]
    fn non_object_element_is_an_encoding_error() {
        let result = encode_batch(&[json!([1, 2, 3])]);
        assert!(matches!(result, Err(ArchivalUploadError::Encoding(_))));
    }
}
