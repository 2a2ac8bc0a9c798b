use arrow_csv::reader::{Format, ReaderBuilder};
use arrow_select::concat::concat_batches;
use async_trait::async_trait;
use river_core::{CsvSourceSpec, Frame, Operator, PipelineError, Result, Source};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, info};

/// Reads a whole CSV file into one frame.
///
/// Column types are inferred from every row, the way a dataframe library would:
/// integers stay integers, ISO dates become dates, anything mixed stays text.
pub struct CsvSource {
    pub id: String,
    pub spec: CsvSourceSpec,
}

impl CsvSource {
    pub fn new(spec: CsvSourceSpec) -> Self {
        Self {
            id: spec.id.clone(),
            spec,
        }
    }

    fn read_error(&self, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::FileRead(format!("{}: {e}", self.spec.path.display()))
    }
}

impl Operator for CsvSource {
    fn name(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Source for CsvSource {
    async fn read(&mut self) -> Result<Frame> {
        let mut file = File::open(&self.spec.path).map_err(|e| self.read_error(e))?;

        let format = Format::default().with_header(self.spec.has_header);
        let (schema, records) = format
            .infer_schema(&mut file, None)
            .map_err(|e| self.read_error(e))?;
        let schema = Arc::new(schema);
        debug!(records, ?schema, "inferred csv schema");

        file.seek(SeekFrom::Start(0))
            .map_err(|e| self.read_error(e))?;

        let reader = ReaderBuilder::new(schema.clone())
            .with_batch_size(self.spec.batch_rows)
            .with_header(self.spec.has_header)
            .build(file)
            .map_err(|e| self.read_error(e))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| self.read_error(e))?;
            debug!("Read batch with {} rows", batch.num_rows());
            batches.push(batch);
        }

        let batch = concat_batches(&schema, &batches).map_err(|e| self.read_error(e))?;
        info!(
            source = %self.id,
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "CSV reader finished"
        );
        Ok(Frame::from_batch(batch))
    }
}
