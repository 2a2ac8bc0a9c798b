//! In-memory tabular structure passed between operators.

use arrow_array::RecordBatch;
use geo_types::Geometry;

use crate::{PipelineError, Result};

/// Type alias for Apache Arrow RecordBatch, holding the attribute columns of a frame
pub type Batch = RecordBatch;

/// One optional geometry per row
pub type GeometryColumn = Vec<Option<Geometry<f64>>>;

/// Name under which the geometry column is selected and stored.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// A whole input file held in memory.
///
/// Scalar attributes live in an Arrow [`Batch`]. Geospatial sources additionally
/// carry a geometry column, kept outside Arrow and addressed by
/// [`GEOMETRY_COLUMN`]. Both always have the same number of rows.
#[derive(Debug, Clone)]
pub struct Frame {
    attributes: Batch,
    geometry: Option<GeometryColumn>,
}

impl Frame {
    /// Build a frame, checking that the geometry column lines up with the attributes.
    pub fn new(attributes: Batch, geometry: Option<GeometryColumn>) -> Result<Self> {
        if let Some(geometry) = &geometry {
            if geometry.len() != attributes.num_rows() {
                return Err(PipelineError::SchemaValidation(format!(
                    "geometry column has {} rows but attributes have {}",
                    geometry.len(),
                    attributes.num_rows()
                )));
            }
        }
        Ok(Self {
            attributes,
            geometry,
        })
    }

    /// A frame without geometry.
    pub fn from_batch(attributes: Batch) -> Self {
        Self {
            attributes,
            geometry: None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.attributes.num_rows()
    }

    pub fn attributes(&self) -> &Batch {
        &self.attributes
    }

    pub fn geometry(&self) -> Option<&[Option<Geometry<f64>>]> {
        self.geometry.as_deref()
    }

    /// Column names in output order: geometry first (when present), then attributes.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.attributes.num_columns() + 1);
        if self.geometry.is_some() {
            names.push(GEOMETRY_COLUMN.to_string());
        }
        names.extend(
            self.attributes
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone()),
        );
        names
    }

    /// Replace the attribute batch, keeping the geometry column.
    pub fn with_attributes(self, attributes: Batch) -> Result<Self> {
        Self::new(attributes, self.geometry)
    }

    /// Replace the geometry column, keeping the attributes.
    pub fn with_geometry(self, geometry: Option<GeometryColumn>) -> Result<Self> {
        Self::new(self.attributes, geometry)
    }

    pub fn into_parts(self) -> (Batch, Option<GeometryColumn>) {
        (self.attributes, self.geometry)
    }
}
