use geo::{Geometry, GeometryCollection, Simplify};
use river_core::{Frame, Operator, PipelineError, Result, Transform};
use tracing::debug;

/// Douglas-Peucker simplification of the geometry column.
///
/// Lines and polygon rings are simplified; points pass through unchanged. Ring
/// endpoints are always kept, so closed rings stay closed.
pub struct SimplifyGeometry {
    id: String,
    tolerance: f64,
}

impl SimplifyGeometry {
    pub fn new(id: String, tolerance: f64) -> Self {
        Self { id, tolerance }
    }
}

pub fn simplify_geometry(geometry: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(&tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(&tolerance)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify(&tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&tolerance)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.0.iter()
                .map(|g| simplify_geometry(g, tolerance))
                .collect(),
        )),
        other => other.clone(),
    }
}

impl Operator for SimplifyGeometry {
    fn name(&self) -> &str {
        &self.id
    }
}

impl Transform for SimplifyGeometry {
    fn apply(&self, frame: Frame) -> Result<Frame> {
        let Some(geometry) = frame.geometry() else {
            return Err(PipelineError::SchemaValidation(
                "simplification needs a geometry column".to_string(),
            ));
        };
        let simplified: Vec<_> = geometry
            .iter()
            .map(|g| g.as_ref().map(|g| simplify_geometry(g, self.tolerance)))
            .collect();
        debug!(transform = %self.id, tolerance = self.tolerance, rows = simplified.len(), "simplified geometry");
        frame.with_geometry(Some(simplified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::RecordBatch;
    use arrow_array::RecordBatchOptions;
    use arrow_schema::Schema;
    use geo::{line_string, point, polygon, CoordsIter};
    use std::sync::Arc;

    fn frame_of(geometry: Vec<Option<Geometry<f64>>>) -> Frame {
        let options = RecordBatchOptions::new().with_row_count(Some(geometry.len()));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::empty()), vec![], &options).unwrap();
        Frame::new(batch, Some(geometry)).unwrap()
    }

    #[test]
    fn near_collinear_vertices_are_removed() {
        let river = Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 0.5, y: 0.0002),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
        ]);
        let out = simplify_geometry(&river, 0.001);
        assert_eq!(out.coords_count(), 3);
    }

    #[test]
    fn never_adds_vertices_and_keeps_rings_closed() {
        let basin = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 0.5, y: 0.0001),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.5, y: 1.0005),
            (x: 0.0, y: 1.0),
        ]);
        let out = simplify_geometry(&basin, 0.001);
        assert!(out.coords_count() <= basin.coords_count());

        let Geometry::Polygon(p) = out else {
            panic!("expected polygon");
        };
        assert!(p.exterior().is_closed());
        assert_eq!(p.exterior().0.len(), 5);
    }

    #[test]
    fn transform_keeps_points_and_null_shapes() {
        let frame = frame_of(vec![Some(Geometry::Point(point!(x: 88.1, y: 22.5))), None]);
        let out = SimplifyGeometry::new("simplify".into(), 0.001)
            .apply(frame)
            .unwrap();
        let geometry = out.geometry().unwrap();
        assert_eq!(geometry[0], Some(Geometry::Point(point!(x: 88.1, y: 22.5))));
        assert_eq!(geometry[1], None);
    }

    #[test]
    fn frame_without_geometry_is_rejected() {
        let frame = Frame::from_batch(RecordBatch::new_empty(Arc::new(Schema::empty())));
        let err = SimplifyGeometry::new("simplify".into(), 0.001)
            .apply(frame)
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation(_)));
    }
}
