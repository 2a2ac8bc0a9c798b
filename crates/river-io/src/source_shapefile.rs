use arrow_array::builder::{BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::{Field, Schema};
use async_trait::async_trait;
use geo_types::Geometry;
use river_core::{Frame, Operator, PipelineError, Result, ShapefileSourceSpec, Source};
use shapefile::dbase::FieldValue;
use shapefile::Shape;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// A single dBASE attribute value, reduced to the kinds a frame column can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Number(f64),
    Bool(bool),
    Text(String),
}

impl From<FieldValue> for Cell {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Character(Some(s)) => Cell::Text(s),
            FieldValue::Memo(s) => Cell::Text(s),
            FieldValue::Numeric(Some(n)) => Cell::Number(n),
            FieldValue::Float(Some(f)) => Cell::Number(f64::from(f)),
            FieldValue::Double(d) => Cell::Number(d),
            FieldValue::Currency(c) => Cell::Number(c),
            FieldValue::Integer(i) => Cell::Integer(i64::from(i)),
            FieldValue::Logical(Some(b)) => Cell::Bool(b),
            FieldValue::Date(Some(d)) => {
                Cell::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
            }
            FieldValue::Character(None)
            | FieldValue::Numeric(None)
            | FieldValue::Float(None)
            | FieldValue::Logical(None)
            | FieldValue::Date(None) => Cell::Null,
            other => Cell::Text(format!("{other:?}")),
        }
    }
}

/// One shapefile record: its geometry (absent for null shapes) and its attributes.
pub type Feature = (Option<Geometry<f64>>, Vec<(String, Cell)>);

/// Reads an ESRI shapefile and its `.dbf` attribute table into one frame.
pub struct ShapefileSource {
    pub id: String,
    pub spec: ShapefileSourceSpec,
}

impl ShapefileSource {
    pub fn new(spec: ShapefileSourceSpec) -> Self {
        Self {
            id: spec.id.clone(),
            spec,
        }
    }
}

impl Operator for ShapefileSource {
    fn name(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Source for ShapefileSource {
    async fn read(&mut self) -> Result<Frame> {
        let path = &self.spec.path;
        let shapes = shapefile::read(path)
            .map_err(|e| PipelineError::FileRead(format!("{}: {e}", path.display())))?;

        let mut features = Vec::with_capacity(shapes.len());
        for (index, (shape, record)) in shapes.into_iter().enumerate() {
            let geometry = match shape {
                Shape::NullShape => {
                    warn!(index, "feature has a null shape");
                    None
                }
                shape => Some(Geometry::<f64>::try_from(shape).map_err(|e| {
                    PipelineError::FileRead(format!(
                        "{}: feature {index} has an unsupported shape: {e:?}",
                        path.display()
                    ))
                })?),
            };
            let attributes = record
                .into_iter()
                .map(|(name, value)| (name, Cell::from(value)))
                .collect();
            features.push((geometry, attributes));
        }

        let frame = features_to_frame(features)?;
        info!(
            source = %self.id,
            rows = frame.num_rows(),
            columns = ?frame.column_names(),
            "Shapefile reader finished"
        );
        Ok(frame)
    }
}

/// Assemble decoded features into a frame.
///
/// Attribute columns are ordered by name. A column whose values are all integers
/// becomes Int64, all numbers Float64, all booleans Boolean; anything else is text.
pub fn features_to_frame(features: Vec<Feature>) -> Result<Frame> {
    let rows = features.len();
    let mut geometry = Vec::with_capacity(rows);
    let mut columns: BTreeMap<String, Vec<Cell>> = BTreeMap::new();

    let names: BTreeSet<String> = features
        .iter()
        .flat_map(|(_, attrs)| attrs.iter().map(|(name, _)| name.clone()))
        .collect();
    for name in names {
        columns.insert(name, vec![Cell::Null; rows]);
    }

    for (row, (geom, attrs)) in features.into_iter().enumerate() {
        geometry.push(geom);
        for (name, cell) in attrs {
            if let Some(column) = columns.get_mut(&name) {
                column[row] = cell;
            }
        }
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for (name, cells) in columns {
        let array = build_column(&cells);
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| PipelineError::FileRead(format!("attribute table: {e}")))?;
    Frame::new(batch, Some(geometry))
}

fn build_column(cells: &[Cell]) -> ArrayRef {
    let values = || cells.iter().filter(|c| **c != Cell::Null);
    let all_integers = values().all(|c| matches!(c, Cell::Integer(_)));
    let all_numbers = values().all(|c| matches!(c, Cell::Integer(_) | Cell::Number(_)));
    let all_bools = values().all(|c| matches!(c, Cell::Bool(_)));
    let any_value = values().next().is_some();

    if any_value && all_integers {
        let mut builder = Int64Builder::with_capacity(cells.len());
        for cell in cells {
            match cell {
                Cell::Integer(i) => builder.append_value(*i),
                _ => builder.append_null(),
            }
        }
        Arc::new(builder.finish())
    } else if any_value && all_numbers {
        let mut builder = Float64Builder::with_capacity(cells.len());
        for cell in cells {
            match cell {
                Cell::Integer(i) => builder.append_value(*i as f64),
                Cell::Number(n) => builder.append_value(*n),
                _ => builder.append_null(),
            }
        }
        Arc::new(builder.finish())
    } else if any_value && all_bools {
        let mut builder = BooleanBuilder::with_capacity(cells.len());
        for cell in cells {
            match cell {
                Cell::Bool(b) => builder.append_value(*b),
                _ => builder.append_null(),
            }
        }
        Arc::new(builder.finish())
    } else {
        let mut builder = StringBuilder::new();
        for cell in cells {
            match cell {
                Cell::Null => builder.append_null(),
                Cell::Integer(i) => builder.append_value(i.to_string()),
                Cell::Number(n) => builder.append_value(n.to_string()),
                Cell::Bool(b) => builder.append_value(b.to_string()),
                Cell::Text(s) => builder.append_value(s),
            }
        }
        Arc::new(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Float64Type;
    use arrow_schema::DataType;
    use geo_types::line_string;

    fn river(name: &str, length: Cell) -> Feature {
        (
            Some(Geometry::LineString(
                line_string![(x: 78.0, y: 30.0), (x: 80.0, y: 26.0)],
            )),
            vec![
                ("name".to_string(), Cell::Text(name.to_string())),
                ("length_km".to_string(), length),
                ("basin".to_string(), Cell::Text("Ganges Basin".to_string())),
            ],
        )
    }

    #[test]
    fn columns_are_typed_from_their_values() {
        let frame = features_to_frame(vec![
            river("Ganges", Cell::Number(2525.0)),
            river("Yamuna", Cell::Integer(1376)),
        ])
        .unwrap();

        assert_eq!(frame.column_names(), vec!["geometry", "basin", "length_km", "name"]);
        let batch = frame.attributes();
        let schema = batch.schema();
        let (idx, field) = schema.column_with_name("length_km").unwrap();
        assert_eq!(field.data_type(), &DataType::Float64);
        let lengths = batch.column(idx).as_primitive::<Float64Type>();
        assert_eq!(lengths.value(1), 1376.0);
    }

    #[test]
    fn mixed_columns_fall_back_to_text() {
        let frame = features_to_frame(vec![
            river("Ganges", Cell::Text("2525".into())),
            river("Yamuna", Cell::Integer(1376)),
            river("Kosi", Cell::Null),
        ])
        .unwrap();
        let batch = frame.attributes();
        let (idx, field) = batch.schema().column_with_name("length_km").map(|(i, f)| (i, f.clone())).unwrap();
        assert_eq!(field.data_type(), &DataType::Utf8);
        let lengths = batch.column(idx).as_string::<i32>();
        assert_eq!(lengths.value(0), "2525");
        assert_eq!(lengths.value(1), "1376");
        assert!(lengths.is_null(2));
    }

    #[test]
    fn features_without_attributes_keep_row_count() {
        let frame = features_to_frame(vec![(None, vec![]), (None, vec![])]).unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.column_names(), vec!["geometry"]);
    }

    #[test]
    fn dbase_values_map_to_cells() {
        assert_eq!(Cell::from(FieldValue::Character(None)), Cell::Null);
        assert_eq!(Cell::from(FieldValue::Numeric(Some(2.5))), Cell::Number(2.5));
        assert_eq!(Cell::from(FieldValue::Integer(7)), Cell::Integer(7));
        assert_eq!(
            Cell::from(FieldValue::Character(Some("Ganges".into()))),
            Cell::Text("Ganges".into())
        );
    }
}
