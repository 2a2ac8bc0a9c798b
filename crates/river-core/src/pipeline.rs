//! Sequential pipeline runner.

use tracing::{debug, error, info};

use crate::{PipelineError, Result, Sink, Source, Transform};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub pipeline: String,
    /// Records handed to the sink
    pub records: usize,
}

/// A source, its transforms and a sink, run one after another.
pub struct Pipeline {
    name: String,
    record_label: String,
    failure_label: String,
    source: Box<dyn Source>,
    transforms: Vec<Box<dyn Transform>>,
    sink: Box<dyn Sink>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        record_label: impl Into<String>,
        source: Box<dyn Source>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            name: name.into(),
            record_label: record_label.into(),
            failure_label: "Processing failed".to_string(),
            source,
            transforms: Vec::new(),
            sink,
        }
    }

    pub fn with_transform(mut self, transform: Box<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn with_transforms(mut self, transforms: Vec<Box<dyn Transform>>) -> Self {
        self.transforms.extend(transforms);
        self
    }

    /// Prefix of the error line logged by [`Pipeline::run_reporting`].
    pub fn with_failure_label(mut self, label: impl Into<String>) -> Self {
        self.failure_label = label.into();
        self
    }

    /// Run every stage in order, stopping at the first error.
    pub async fn run(&mut self) -> Result<RunReport> {
        info!(pipeline = %self.name, source = self.source.name(), "reading source");
        let mut frame = self.source.read().await?;
        debug!(pipeline = %self.name, rows = frame.num_rows(), "source read");

        for transform in &self.transforms {
            frame = transform.apply(frame)?;
            debug!(
                pipeline = %self.name,
                transform = transform.name(),
                rows = frame.num_rows(),
                "transform applied"
            );
        }

        info!(pipeline = %self.name, sink = self.sink.name(), rows = frame.num_rows(), "writing");
        let records = self.sink.write(frame).await?;

        Ok(RunReport {
            pipeline: self.name.clone(),
            records,
        })
    }

    /// Run and collapse the outcome into a success flag.
    ///
    /// Logs the processed record count at INFO on success and the error at ERROR on failure.
    pub async fn run_reporting(&mut self) -> bool {
        match self.run().await {
            Ok(report) => {
                info!("Processed {} {} records", report.records, self.record_label);
                true
            }
            Err(e) => {
                error!(
                    pipeline = %self.name,
                    kind = e.kind(),
                    retryable = e.is_retryable(),
                    "{}",
                    self.failure_message(&e)
                );
                false
            }
        }
    }

    fn failure_message(&self, e: &PipelineError) -> String {
        format!("{}: {e}", self.failure_label)
    }
}
