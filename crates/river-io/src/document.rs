//! Conversion of frames into BSON documents.

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::Array;
use arrow_schema::{DataType, TimeUnit};
use geo_types::{Coord, Geometry, LineString, Polygon};
use mongodb::bson::{doc, Bson, DateTime, Document};
use river_core::{Frame, PipelineError, Result, GEOMETRY_COLUMN};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// One document per row, with fields in frame column order.
///
/// The geometry column is encoded as GeoJSON so it can carry a `2dsphere` index.
/// Null cells become BSON null.
pub fn frame_to_documents(frame: &Frame) -> Result<Vec<Document>> {
    let batch = frame.attributes();
    let schema = batch.schema();
    let mut documents = Vec::with_capacity(frame.num_rows());

    for row in 0..frame.num_rows() {
        let mut document = Document::new();
        if let Some(geometry) = frame.geometry() {
            let value = match &geometry[row] {
                Some(g) => Bson::Document(geometry_to_geojson(g)),
                None => Bson::Null,
            };
            document.insert(GEOMETRY_COLUMN, value);
        }
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            document.insert(field.name().clone(), cell_to_bson(column.as_ref(), row, field.name())?);
        }
        documents.push(document);
    }
    Ok(documents)
}

fn cell_to_bson(array: &dyn Array, row: usize, column: &str) -> Result<Bson> {
    if array.is_null(row) {
        return Ok(Bson::Null);
    }
    let value = match array.data_type() {
        DataType::Null => Bson::Null,
        DataType::Boolean => Bson::Boolean(array.as_boolean().value(row)),
        DataType::Utf8 => Bson::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Bson::String(array.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => Bson::Int32(array.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Bson::Int32(array.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Bson::Int32(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Bson::Int64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Bson::Int32(array.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Bson::Int32(array.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Bson::Int64(array.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            match i64::try_from(v) {
                Ok(v) => Bson::Int64(v),
                Err(_) => Bson::Double(v as f64),
            }
        }
        DataType::Float32 => Bson::Double(array.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Bson::Double(array.as_primitive::<Float64Type>().value(row)),
        DataType::Date32 => {
            let days = i64::from(array.as_primitive::<Date32Type>().value(row));
            Bson::DateTime(DateTime::from_millis(days * MILLIS_PER_DAY))
        }
        DataType::Date64 => {
            Bson::DateTime(DateTime::from_millis(array.as_primitive::<Date64Type>().value(row)))
        }
        DataType::Timestamp(unit, _) => {
            let millis = match unit {
                TimeUnit::Second => {
                    array.as_primitive::<TimestampSecondType>().value(row) * 1_000
                }
                TimeUnit::Millisecond => {
                    array.as_primitive::<TimestampMillisecondType>().value(row)
                }
                TimeUnit::Microsecond => {
                    array.as_primitive::<TimestampMicrosecondType>().value(row) / 1_000
                }
                TimeUnit::Nanosecond => {
                    array.as_primitive::<TimestampNanosecondType>().value(row) / 1_000_000
                }
            };
            Bson::DateTime(DateTime::from_millis(millis))
        }
        other => {
            return Err(PipelineError::TypeCoercion(format!(
                "column '{column}' has type {other} which has no document representation"
            )))
        }
    };
    Ok(value)
}

/// Encode a geometry as a GeoJSON object.
pub fn geometry_to_geojson(geometry: &Geometry<f64>) -> Document {
    match geometry {
        Geometry::Point(p) => doc! { "type": "Point", "coordinates": position(&p.0) },
        Geometry::Line(l) => doc! {
            "type": "LineString",
            "coordinates": [position(&l.start), position(&l.end)],
        },
        Geometry::LineString(ls) => doc! { "type": "LineString", "coordinates": path(ls) },
        Geometry::Polygon(p) => doc! { "type": "Polygon", "coordinates": rings(p) },
        Geometry::MultiPoint(mp) => doc! {
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        },
        Geometry::MultiLineString(mls) => doc! {
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(path).collect::<Vec<_>>(),
        },
        Geometry::MultiPolygon(mp) => doc! {
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(rings).collect::<Vec<_>>(),
        },
        Geometry::GeometryCollection(gc) => doc! {
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_to_geojson).collect::<Vec<_>>(),
        },
        Geometry::Rect(r) => doc! { "type": "Polygon", "coordinates": rings(&r.to_polygon()) },
        Geometry::Triangle(t) => doc! { "type": "Polygon", "coordinates": rings(&t.to_polygon()) },
    }
}

fn position(c: &Coord<f64>) -> Bson {
    Bson::Array(vec![Bson::Double(c.x), Bson::Double(c.y)])
}

fn path(ls: &LineString<f64>) -> Bson {
    Bson::Array(ls.0.iter().map(position).collect())
}

fn rings(p: &Polygon<f64>) -> Bson {
    Bson::Array(
        std::iter::once(p.exterior())
            .chain(p.interiors())
            .map(path)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray, TimestampMillisecondArray};
    use geo_types::{point, polygon};
    use std::sync::Arc;

    #[test]
    fn rows_become_documents_in_column_order() {
        let name: ArrayRef = Arc::new(StringArray::from(vec![Some("Ganges"), None]));
        let length: ArrayRef = Arc::new(Float64Array::from(vec![2525.0, 1376.0]));
        let budget: ArrayRef = Arc::new(Int64Array::from(vec![20000, 15]));
        let batch =
            RecordBatch::try_from_iter(vec![("name", name), ("length_km", length), ("Budget", budget)])
                .unwrap();
        let frame = Frame::new(
            batch,
            Some(vec![Some(Geometry::Point(point!(x: 88.0, y: 22.0))), None]),
        )
        .unwrap();

        let docs = frame_to_documents(&frame).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(
            docs[0],
            doc! {
                "geometry": { "type": "Point", "coordinates": [88.0, 22.0] },
                "name": "Ganges",
                "length_km": 2525.0,
                "Budget": 20000_i64,
            }
        );
        assert_eq!(docs[1].get("name"), Some(&Bson::Null));
        assert_eq!(docs[1].get("geometry"), Some(&Bson::Null));
    }

    #[test]
    fn timestamps_become_bson_datetimes() {
        let ts: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![1_433_116_800_000]));
        let batch = RecordBatch::try_from_iter(vec![("Start Date", ts)]).unwrap();
        let docs = frame_to_documents(&Frame::from_batch(batch)).unwrap();
        assert_eq!(
            docs[0].get_datetime("Start Date").unwrap(),
            &DateTime::from_millis(1_433_116_800_000)
        );
    }

    #[test]
    fn polygon_rings_stay_closed_in_geojson() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let geojson = geometry_to_geojson(&Geometry::Polygon(square));
        assert_eq!(geojson.get_str("type").unwrap(), "Polygon");
        let rings = geojson.get_array("coordinates").unwrap();
        let exterior = rings[0].as_array().unwrap();
        assert_eq!(exterior.len(), 5);
        assert_eq!(exterior.first(), exterior.last());
    }
}
