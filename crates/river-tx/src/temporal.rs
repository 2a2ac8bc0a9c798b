use arrow_array::builder::TimestampMillisecondBuilder;
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, TimestampMillisecondArray};
use arrow_cast::cast::cast;
use arrow_schema::{DataType, Field, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use river_core::{Frame, Operator, PipelineError, Result, Transform};
use std::sync::Arc;
use tracing::debug;

use crate::{column_index, replace_column, upsert_column};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, None)
}

/// Parse a date or date-time string. Zone-qualified values are converted to UTC.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Turn a column into millisecond timestamps.
///
/// Text is parsed with [`parse_datetime`]; date and timestamp columns are first
/// rendered as ISO text so every input goes through the same path. Empty cells
/// become null, anything unparseable is a [`PipelineError::TypeCoercion`].
pub struct ParseTimestamp {
    id: String,
    column: String,
}

impl ParseTimestamp {
    pub fn new(id: String, column: String) -> Self {
        Self { id, column }
    }
}

impl Operator for ParseTimestamp {
    fn name(&self) -> &str {
        &self.id
    }
}

impl Transform for ParseTimestamp {
    fn apply(&self, frame: Frame) -> Result<Frame> {
        let batch = frame.attributes();
        let index = column_index(batch, &self.column)?;
        let source = batch.column(index);

        let text = match source.data_type() {
            DataType::Utf8 => source.clone(),
            other => cast(source, &DataType::Utf8).map_err(|e| {
                PipelineError::TypeCoercion(format!(
                    "column '{}' ({other}) cannot be read as dates: {e}",
                    self.column
                ))
            })?,
        };
        let text = text.as_string::<i32>();

        let mut builder = TimestampMillisecondBuilder::with_capacity(text.len());
        for (row, value) in text.iter().enumerate() {
            match value.map(str::trim) {
                None | Some("") => builder.append_null(),
                Some(value) => {
                    let parsed = parse_datetime(value).ok_or_else(|| {
                        PipelineError::TypeCoercion(format!(
                            "column '{}' row {row}: '{value}' is not a valid date",
                            self.column
                        ))
                    })?;
                    builder.append_value(parsed.and_utc().timestamp_millis());
                }
            }
        }
        let parsed: ArrayRef = Arc::new(builder.finish());
        debug!(transform = %self.id, column = %self.column, rows = parsed.len(), "parsed timestamps");

        let field = Field::new(self.column.clone(), timestamp_type(), true);
        let batch = replace_column(batch, index, field, parsed)?;
        frame.with_attributes(batch)
    }
}

/// Add (or overwrite) a column holding a single instant for every row.
pub struct StampNow {
    id: String,
    column: String,
    at: DateTime<Utc>,
}

impl StampNow {
    pub fn new(id: String, column: String, at: DateTime<Utc>) -> Self {
        Self { id, column, at }
    }
}

impl Operator for StampNow {
    fn name(&self) -> &str {
        &self.id
    }
}

impl Transform for StampNow {
    fn apply(&self, frame: Frame) -> Result<Frame> {
        let millis = self.at.timestamp_millis();
        let stamps: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![
            millis;
            frame.num_rows()
        ]));
        let field = Field::new(self.column.clone(), timestamp_type(), false);
        let batch = upsert_column(frame.attributes(), field, stamps)?;
        debug!(transform = %self.id, column = %self.column, at = %self.at, "stamped rows");
        frame.with_attributes(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::types::TimestampMillisecondType;
    use arrow_array::{Date32Array, RecordBatch, StringArray};
    use chrono::TimeZone;

    fn frame_with(column: ArrayRef) -> Frame {
        Frame::from_batch(RecordBatch::try_from_iter(vec![("Start Date", column)]).unwrap())
    }

    fn millis(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap().timestamp_millis()
    }

    #[test]
    fn accepts_common_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2015, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for input in ["2015-06-01", "2015/06/01", "06/01/2015", "2015-06-01T00:00:00Z", "2015-06-01 00:00:00"] {
            assert_eq!(parse_datetime(input), Some(expected), "{input}");
        }
        assert_eq!(parse_datetime("first of June"), None);
    }

    #[test]
    fn text_column_becomes_timestamps() {
        let column: ArrayRef = Arc::new(StringArray::from(vec![Some("2015-06-01"), Some(""), None]));
        let out = ParseTimestamp::new("start".into(), "Start Date".into())
            .apply(frame_with(column))
            .unwrap();
        let values = out.attributes().column(0).as_primitive::<TimestampMillisecondType>();
        assert_eq!(values.value(0), millis(2015, 6, 1));
        assert!(values.is_null(1));
        assert!(values.is_null(2));
    }

    #[test]
    fn inferred_date_column_is_converted() {
        // 16587 days after the epoch is 2015-06-01
        let column: ArrayRef = Arc::new(Date32Array::from(vec![16587]));
        let out = ParseTimestamp::new("start".into(), "Start Date".into())
            .apply(frame_with(column))
            .unwrap();
        let values = out.attributes().column(0).as_primitive::<TimestampMillisecondType>();
        assert_eq!(values.value(0), millis(2015, 6, 1));
    }

    #[test]
    fn malformed_date_fails_with_row_number() {
        let column: ArrayRef = Arc::new(StringArray::from(vec!["2015-06-01", "soon"]));
        let err = ParseTimestamp::new("start".into(), "Start Date".into())
            .apply(frame_with(column))
            .unwrap_err();
        assert!(matches!(err, PipelineError::TypeCoercion(msg) if msg.contains("row 1")));
    }

    #[test]
    fn stamp_now_writes_same_instant_on_every_row() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let column: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
        let out = StampNow::new("stamp".into(), "Last Updated".into(), at)
            .apply(frame_with(column))
            .unwrap();
        let batch = out.attributes();
        assert_eq!(batch.num_columns(), 2);
        let stamps = batch.column(1).as_primitive::<TimestampMillisecondType>();
        assert_eq!(stamps.value(0), at.timestamp_millis());
        assert_eq!(stamps.value(1), at.timestamp_millis());
    }
}
