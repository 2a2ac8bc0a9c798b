use river_core::{Frame, Operator, PipelineError, Result, Transform, GEOMETRY_COLUMN};
use tracing::debug;

use crate::available;

/// Keep a fixed subset of columns.
///
/// `geometry` refers to the frame's geometry column; every other name must be an
/// attribute column. All missing names are reported together.
pub struct SelectColumns {
    id: String,
    columns: Vec<String>,
}

impl SelectColumns {
    pub fn new(id: String, columns: Vec<String>) -> Self {
        Self { id, columns }
    }
}

impl Operator for SelectColumns {
    fn name(&self) -> &str {
        &self.id
    }
}

impl Transform for SelectColumns {
    fn apply(&self, frame: Frame) -> Result<Frame> {
        let schema = frame.attributes().schema();
        let mut indices = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();
        let mut keep_geometry = false;

        for column in &self.columns {
            if column == GEOMETRY_COLUMN && frame.geometry().is_some() {
                keep_geometry = true;
                continue;
            }
            match schema.index_of(column) {
                Ok(index) => indices.push(index),
                Err(_) => missing.push(column.as_str()),
            }
        }

        if !missing.is_empty() {
            let mut present = frame.column_names();
            if present.is_empty() {
                present.push("<none>".to_string());
            }
            return Err(PipelineError::SchemaValidation(format!(
                "missing required column(s) {} (available: {})",
                missing.join(", "),
                present.join(", ")
            )));
        }

        let projected = frame
            .attributes()
            .project(&indices)
            .map_err(|e| {
                PipelineError::SchemaValidation(format!(
                    "projection over [{}] failed: {e}",
                    available(frame.attributes())
                ))
            })?;
        debug!(transform = %self.id, columns = ?self.columns, "projected columns");

        let (_, geometry) = frame.into_parts();
        Frame::new(projected, if keep_geometry { geometry } else { None })
    }
}
