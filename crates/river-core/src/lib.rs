//! # River Core - shared pipeline abstractions
//!
//! This crate provides the foundational types, traits, and configuration structures
//! for the river-etl batch loaders. Every pipeline is a straight line of operators:
//! one [`Source`] produces a [`Frame`], zero or more [`Transform`]s reshape it, and a
//! single [`Sink`] persists it.
//!
//! ## Key Components
//!
//! - **Frame**: Arrow attribute columns plus an optional geometry column
//! - **Operator Traits**: Source, Transform, and Sink abstractions
//! - **Configuration**: serde/YAML pipeline specifications and the explicit [`PipelineConfig`]
//! - **Error Handling**: the tagged [`PipelineError`] taxonomy
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use river_core::{Pipeline, Sink, Source, Transform};
//!
//! # async fn example(source: Box<dyn Source>, sink: Box<dyn Sink>, t: Box<dyn Transform>) {
//! let mut pipeline = Pipeline::new("example", "example", source, sink).with_transform(t);
//! let succeeded = pipeline.run_reporting().await;
//! # let _ = succeeded;
//! # }
//! ```

pub mod error;
pub mod frame;
pub mod pipeline;
pub mod spec;

use async_trait::async_trait;

pub use error::{PipelineError, Result};
pub use frame::{Batch, Frame, GeometryColumn, GEOMETRY_COLUMN};
pub use pipeline::{Pipeline, RunReport};
pub use spec::{
    CsvSourceSpec, MongoSinkSpec, PipelineConfig, PipelineSpec, ShapefileSourceSpec, SinkSpec,
    SourceSpec, TransformSpec, WriteMode, DEFAULT_DATABASE,
};

/// Base trait for all pipeline operators
///
/// Provides the identifier used in logs when a pipeline reports which stage it is in.
pub trait Operator: Send + Sync {
    /// Returns the unique name/identifier of this operator
    fn name(&self) -> &str;
}

/// Trait for data source operators
///
/// Sources are the entry points of a pipeline. They load a whole file into memory
/// and hand it over as a single [`Frame`].
///
/// ## Examples
/// - CSV file reader
/// - Shapefile reader
#[async_trait]
pub trait Source: Operator {
    /// Read the complete input.
    ///
    /// Failures to open or decode the file are reported as
    /// [`PipelineError::FileRead`].
    async fn read(&mut self) -> Result<Frame>;
}

/// Trait for data transformation operators
///
/// Transforms take ownership of the frame and return the reshaped one. They never
/// touch the outside world, so they are synchronous.
///
/// ## Examples
/// - Column projection
/// - Numeric coercion
/// - Geometry simplification
/// - Date parsing and ingestion timestamps
pub trait Transform: Operator {
    /// Apply the transformation to a frame
    fn apply(&self, frame: Frame) -> Result<Frame>;
}

/// Trait for data sink operators
///
/// Sinks are the exit points of a pipeline, writing the final frame to external storage.
#[async_trait]
pub trait Sink: Operator {
    /// Persist the frame.
    ///
    /// # Returns
    /// The number of records written
    async fn write(&mut self, frame: Frame) -> Result<usize>;
}
