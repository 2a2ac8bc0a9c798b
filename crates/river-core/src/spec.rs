//! Serializable pipeline descriptions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Database that both loaders write to unless told otherwise.
pub const DEFAULT_DATABASE: &str = "river_db";

/// Explicit runtime configuration for one loader invocation.
///
/// Replaces process-wide environment lookups inside the pipelines: binaries read
/// the environment once and pass this down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// File the source operator reads
    pub source_path: PathBuf,

    /// MongoDB connection string
    pub database_uri: String,

    /// Target database name
    #[serde(default = "default_database")]
    pub database: String,
}

impl PipelineConfig {
    pub fn new(source_path: impl Into<PathBuf>, database_uri: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            database_uri: database_uri.into(),
            database: default_database(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}

/// Complete pipeline specification
///
/// Describes a single source, an ordered list of transforms and a single sink.
/// The loaders build theirs in code; the same shape can be loaded from YAML.
///
/// # Example YAML Configuration
///
/// ```yaml
/// name: "gov-schemes"
/// record_label: "scheme"
/// source:
///   type: file_csv
///   id: "schemes-csv"
///   path: "data/schemes.csv"
/// transforms:
///   - type: select
///     id: "columns"
///     columns: ["Scheme Name", "Status", "Start Date", "Budget"]
///   - type: parse_timestamp
///     id: "start-date"
///     column: "Start Date"
/// sink:
///   type: mongo
///   id: "gov-schemes"
///   uri: "mongodb://localhost:27017"
///   collection: "gov_schemes"
///   key: "Scheme Name"
///   write_mode: bulk
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Human-readable name of the pipeline
    pub name: String,

    /// Noun used in the completion log line, e.g. "Processed 12 scheme records"
    pub record_label: String,

    /// Prefix of the error log line when a run fails
    #[serde(default = "default_failure_label")]
    pub failure_label: String,

    pub source: SourceSpec,

    /// Transforms applied in order
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,

    pub sink: SinkSpec,
}

impl PipelineSpec {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// The MongoDB sink settings, for callers that adjust collection or index options.
    pub fn mongo_sink_mut(&mut self) -> &mut MongoSinkSpec {
        let SinkSpec::Mongo(mongo) = &mut self.sink;
        mongo
    }
}

/// Configuration for CSV file data sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSourceSpec {
    /// Unique identifier for this source operator
    pub id: String,

    /// Path to the CSV file
    pub path: PathBuf,

    /// Whether the CSV file has a header row
    ///
    /// If false, columns are named `column_1`, `column_2`, ...
    #[serde(default = "default_true")]
    pub has_header: bool,

    /// Number of rows decoded per Arrow batch while reading
    #[serde(default = "default_batch_rows")]
    pub batch_rows: usize,
}

/// Configuration for ESRI shapefile sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapefileSourceSpec {
    pub id: String,

    /// Path to the `.shp` file; the `.dbf` next to it supplies the attributes
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceSpec {
    #[serde(rename = "file_csv")]
    Csv(CsvSourceSpec),
    #[serde(rename = "shapefile")]
    Shapefile(ShapefileSourceSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransformSpec {
    /// Keep only the listed columns, in the listed order
    #[serde(rename = "select")]
    Select { id: String, columns: Vec<String> },
    /// Convert a column to 64-bit floats, failing on unparseable values
    #[serde(rename = "cast_float")]
    CastFloat { id: String, column: String },
    /// Douglas-Peucker simplification of the geometry column
    #[serde(rename = "simplify")]
    Simplify {
        id: String,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// Parse a text (or date) column into timestamps
    #[serde(rename = "parse_timestamp")]
    ParseTimestamp { id: String, column: String },
    /// Add a column holding the run's start time
    #[serde(rename = "stamp_now")]
    StampNow { id: String, column: String },
}

impl TransformSpec {
    pub fn id(&self) -> &str {
        match self {
            TransformSpec::Select { id, .. }
            | TransformSpec::CastFloat { id, .. }
            | TransformSpec::Simplify { id, .. }
            | TransformSpec::ParseTimestamp { id, .. }
            | TransformSpec::StampNow { id, .. } => id,
        }
    }
}

/// How upserts are submitted to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// One round trip per record. A failure mid-way leaves earlier records written.
    #[default]
    PerRecord,
    /// All upserts in a single ordered bulk command.
    Bulk,
}

/// Configuration for MongoDB upsert sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MongoSinkSpec {
    pub id: String,

    /// MongoDB connection string; left empty in YAML to take it from the command line
    #[serde(default)]
    pub uri: String,

    #[serde(default = "default_database")]
    pub database: String,

    pub collection: String,

    /// Natural key field used as the upsert filter
    pub key: String,

    /// Field that gets a `2dsphere` index before writing, if any
    #[serde(default)]
    pub geo_index: Option<String>,

    #[serde(default)]
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkSpec {
    #[serde(rename = "mongo")]
    Mongo(MongoSinkSpec),
}

fn default_true() -> bool {
    true
}

/// Default batch size for CSV decoding
fn default_batch_rows() -> usize {
    65536
}

/// Simplification tolerance in coordinate units (degrees for WGS84 data)
fn default_tolerance() -> f64 {
    0.001
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_failure_label() -> String {
    "Processing failed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: "gov-schemes"
record_label: "scheme"
source:
  type: file_csv
  id: "schemes-csv"
  path: "data/schemes.csv"
transforms:
  - type: select
    id: "columns"
    columns: ["Scheme Name", "Budget"]
  - type: simplify
    id: "simplify"
sink:
  type: mongo
  id: "gov-schemes"
  uri: "mongodb://localhost:27017"
  collection: "gov_schemes"
  key: "Scheme Name"
  write_mode: bulk
"#;

    #[test]
    fn yaml_fills_defaults() {
        let spec = PipelineSpec::from_yaml(YAML).unwrap();
        assert_eq!(spec.name, "gov-schemes");
        assert_eq!(spec.failure_label, "Processing failed");

        let SourceSpec::Csv(csv) = &spec.source else {
            panic!("expected csv source");
        };
        assert!(csv.has_header);
        assert_eq!(csv.batch_rows, 65536);

        assert_eq!(
            spec.transforms[1],
            TransformSpec::Simplify {
                id: "simplify".into(),
                tolerance: 0.001
            }
        );

        let SinkSpec::Mongo(mongo) = &spec.sink;
        assert_eq!(mongo.database, "river_db");
        assert_eq!(mongo.geo_index, None);
        assert_eq!(mongo.write_mode, WriteMode::Bulk);
    }

    #[test]
    fn unknown_transform_is_rejected() {
        let yaml = YAML.replace("type: simplify", "type: explode");
        assert!(PipelineSpec::from_yaml(&yaml).is_err());
    }

    #[test]
    fn sink_uri_may_be_left_to_the_caller() {
        let yaml = YAML.replace("  uri: \"mongodb://localhost:27017\"\n", "");
        let mut spec = PipelineSpec::from_yaml(&yaml).unwrap();
        assert_eq!(spec.mongo_sink_mut().uri, "");
    }

    #[test]
    fn config_defaults_to_river_db() {
        let config = PipelineConfig::new("rivers.shp", "mongodb://localhost");
        assert_eq!(config.database, "river_db");
        assert_eq!(config.with_database("staging").database, "staging");
    }
}
