use arrow_cast::cast::{cast_with_options, CastOptions};
use arrow_schema::{DataType, Field};
use river_core::{Frame, Operator, PipelineError, Result, Transform};
use tracing::debug;

use crate::{column_index, replace_column};

/// Convert one column to Float64.
///
/// Text is parsed strictly: a value that is not a number fails the whole frame
/// instead of turning into null. Nulls stay null.
pub struct CastFloat {
    id: String,
    column: String,
}

impl CastFloat {
    pub fn new(id: String, column: String) -> Self {
        Self { id, column }
    }
}

impl Operator for CastFloat {
    fn name(&self) -> &str {
        &self.id
    }
}

impl Transform for CastFloat {
    fn apply(&self, frame: Frame) -> Result<Frame> {
        let batch = frame.attributes();
        let index = column_index(batch, &self.column)?;
        let source = batch.column(index);
        if source.data_type() == &DataType::Float64 {
            return Ok(frame);
        }

        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        let cast = cast_with_options(source, &DataType::Float64, &options).map_err(|e| {
            PipelineError::TypeCoercion(format!(
                "column '{}' ({}) cannot be read as float: {e}",
                self.column,
                source.data_type()
            ))
        })?;
        debug!(transform = %self.id, column = %self.column, from = %source.data_type(), "cast to Float64");

        let field = Field::new(self.column.clone(), DataType::Float64, true);
        let batch = replace_column(batch, index, field, cast)?;
        frame.with_attributes(batch)
    }
}
