//! # River TX - column transforms
//!
//! Transform operators used by the loaders, plus [`build_transforms`] which turns
//! [`TransformSpec`]s into boxed operators.

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{Field, Schema};
use chrono::{DateTime, Utc};
use river_core::{Batch, PipelineError, Result, Transform, TransformSpec};
use std::sync::Arc;

pub mod coerce;
pub mod select;
pub mod simplify;
pub mod temporal;

pub use coerce::CastFloat;
pub use select::SelectColumns;
pub use simplify::SimplifyGeometry;
pub use temporal::{ParseTimestamp, StampNow};

/// Build operators for `specs`, in order.
///
/// `run_started` is the instant written by `stamp_now` transforms, so every row of a
/// run carries the same value.
pub fn build_transforms(
    specs: &[TransformSpec],
    run_started: DateTime<Utc>,
) -> Vec<Box<dyn Transform>> {
    specs
        .iter()
        .map(|spec| -> Box<dyn Transform> {
            match spec {
                TransformSpec::Select { id, columns } => {
                    Box::new(SelectColumns::new(id.clone(), columns.clone()))
                }
                TransformSpec::CastFloat { id, column } => {
                    Box::new(CastFloat::new(id.clone(), column.clone()))
                }
                TransformSpec::Simplify { id, tolerance } => {
                    Box::new(SimplifyGeometry::new(id.clone(), *tolerance))
                }
                TransformSpec::ParseTimestamp { id, column } => {
                    Box::new(ParseTimestamp::new(id.clone(), column.clone()))
                }
                TransformSpec::StampNow { id, column } => {
                    Box::new(StampNow::new(id.clone(), column.clone(), run_started))
                }
            }
        })
        .collect()
}

/// Position of `column` in the batch, or a schema error naming what is available.
pub(crate) fn column_index(batch: &Batch, column: &str) -> Result<usize> {
    batch.schema().index_of(column).map_err(|_| {
        PipelineError::SchemaValidation(format!(
            "missing column '{column}' (available: {})",
            available(batch)
        ))
    })
}

pub(crate) fn available(batch: &Batch) -> String {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Swap the column at `index` for `array` described by `field`.
pub(crate) fn replace_column(
    batch: &Batch,
    index: usize,
    field: Field,
    array: ArrayRef,
) -> Result<Batch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    fields[index] = field;
    columns[index] = array;
    rebuild(schema.metadata().clone(), fields, columns)
}

/// Add `array` as the last column, or replace an existing column with the same name.
pub(crate) fn upsert_column(batch: &Batch, field: Field, array: ArrayRef) -> Result<Batch> {
    if let Ok(index) = batch.schema().index_of(field.name()) {
        return replace_column(batch, index, field, array);
    }
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    fields.push(field);
    columns.push(array);
    rebuild(schema.metadata().clone(), fields, columns)
}

fn rebuild(
    metadata: std::collections::HashMap<String, String>,
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
) -> Result<Batch> {
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    RecordBatch::try_new(schema, columns)
        .map_err(|e| PipelineError::SchemaValidation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_operator_per_spec_in_order() {
        let specs = vec![
            TransformSpec::Select {
                id: "columns".into(),
                columns: vec!["name".into()],
            },
            TransformSpec::Simplify {
                id: "simplify".into(),
                tolerance: 0.001,
            },
            TransformSpec::StampNow {
                id: "stamp".into(),
                column: "Last Updated".into(),
            },
        ];
        let ops = build_transforms(&specs, Utc::now());
        let names: Vec<&str> = ops.iter().map(|op| op.name()).collect();
        assert_eq!(names, vec!["columns", "simplify", "stamp"]);
    }
}
