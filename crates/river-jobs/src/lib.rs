//! # River Jobs - the two loaders
//!
//! Pipeline specifications for the river geography and government scheme loaders,
//! and the glue that turns a [`PipelineSpec`] into a runnable [`Pipeline`].
//!
//! | loader          | source              | key           | index                | write mode |
//! |-----------------|---------------------|---------------|----------------------|------------|
//! | river geography | shapefile           | `name`        | 2dsphere `geometry`  | per record |
//! | gov schemes     | CSV                 | `Scheme Name` | none                 | bulk       |

use chrono::{DateTime, Utc};
use river_core::{
    CsvSourceSpec, MongoSinkSpec, Pipeline, PipelineConfig, PipelineError, PipelineSpec, Result,
    ShapefileSourceSpec, SinkSpec, Source, SourceSpec, TransformSpec, WriteMode, GEOMETRY_COLUMN,
};
use river_io::bson::Document;
use river_io::source_csv::CsvSource;
use river_io::source_shapefile::ShapefileSource;
use river_io::{DocumentSink, DocumentStore, MemoryStore, MongoStore};
use std::path::Path;
use tracing::info;

pub const GEOGRAPHY_COLLECTION: &str = "river_geography";
pub const SCHEMES_COLLECTION: &str = "gov_schemes";

/// Douglas-Peucker tolerance for river geometries, in coordinate units.
pub const SIMPLIFY_TOLERANCE: f64 = 0.001;

pub const GEOGRAPHY_COLUMNS: [&str; 4] = [GEOMETRY_COLUMN, "name", "length_km", "basin"];
pub const SCHEME_COLUMNS: [&str; 5] = [
    "Scheme Name",
    "Project Details",
    "Status",
    "Start Date",
    "Budget",
];

/// Shapefile → `river_db.river_geography`, one upsert per river keyed on `name`.
pub fn river_geography_spec(config: &PipelineConfig) -> PipelineSpec {
    PipelineSpec {
        name: "river-geography".to_string(),
        record_label: "river geography".to_string(),
        failure_label: "Processing failed".to_string(),
        source: SourceSpec::Shapefile(ShapefileSourceSpec {
            id: "river-shapefile".to_string(),
            path: config.source_path.clone(),
        }),
        transforms: vec![
            TransformSpec::Select {
                id: "select-columns".to_string(),
                columns: GEOGRAPHY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            },
            TransformSpec::CastFloat {
                id: "length-km".to_string(),
                column: "length_km".to_string(),
            },
            TransformSpec::Simplify {
                id: "simplify-geometry".to_string(),
                tolerance: SIMPLIFY_TOLERANCE,
            },
        ],
        sink: SinkSpec::Mongo(MongoSinkSpec {
            id: "river-geography-sink".to_string(),
            uri: config.database_uri.clone(),
            database: config.database.clone(),
            collection: GEOGRAPHY_COLLECTION.to_string(),
            key: "name".to_string(),
            geo_index: Some(GEOMETRY_COLUMN.to_string()),
            write_mode: WriteMode::PerRecord,
        }),
    }
}

/// CSV → `river_db.gov_schemes`, one bulk upsert keyed on `Scheme Name`.
pub fn gov_schemes_spec(config: &PipelineConfig) -> PipelineSpec {
    PipelineSpec {
        name: "gov-schemes".to_string(),
        record_label: "scheme".to_string(),
        failure_label: "Scheme processing failed".to_string(),
        source: SourceSpec::Csv(CsvSourceSpec {
            id: "schemes-csv".to_string(),
            path: config.source_path.clone(),
            has_header: true,
            batch_rows: 65536,
        }),
        transforms: vec![
            TransformSpec::Select {
                id: "select-columns".to_string(),
                columns: SCHEME_COLUMNS.iter().map(|c| c.to_string()).collect(),
            },
            TransformSpec::ParseTimestamp {
                id: "start-date".to_string(),
                column: "Start Date".to_string(),
            },
            TransformSpec::StampNow {
                id: "last-updated".to_string(),
                column: "Last Updated".to_string(),
            },
        ],
        sink: SinkSpec::Mongo(MongoSinkSpec {
            id: "gov-schemes-sink".to_string(),
            uri: config.database_uri.clone(),
            database: config.database.clone(),
            collection: SCHEMES_COLLECTION.to_string(),
            key: "Scheme Name".to_string(),
            geo_index: None,
            write_mode: WriteMode::Bulk,
        }),
    }
}

/// Read a YAML pipeline from `path`.
///
/// A sink without a `uri` takes `database_uri`. An unreadable file is a
/// [`PipelineError::FileRead`], YAML that does not describe a pipeline a
/// [`PipelineError::SchemaValidation`].
pub fn load_pipeline(path: &Path, database_uri: &str) -> Result<PipelineSpec> {
    let yaml = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::FileRead(format!("{}: {e}", path.display())))?;
    let mut spec = PipelineSpec::from_yaml(&yaml)
        .map_err(|e| PipelineError::SchemaValidation(format!("{}: {e}", path.display())))?;
    let sink = spec.mongo_sink_mut();
    if sink.uri.is_empty() {
        sink.uri = database_uri.to_string();
    }
    Ok(spec)
}

pub fn build_source(spec: &SourceSpec) -> Box<dyn Source> {
    match spec {
        SourceSpec::Csv(csv) => Box::new(CsvSource::new(csv.clone())),
        SourceSpec::Shapefile(shp) => Box::new(ShapefileSource::new(shp.clone())),
    }
}

/// Wire `spec`'s transforms and sink around an already-built source.
pub fn assemble<S>(
    spec: &PipelineSpec,
    source: Box<dyn Source>,
    store: S,
    run_started: DateTime<Utc>,
) -> Pipeline
where
    S: DocumentStore + 'static,
{
    let SinkSpec::Mongo(sink) = &spec.sink;
    Pipeline::new(
        spec.name.clone(),
        spec.record_label.clone(),
        source,
        Box::new(DocumentSink::new(sink, store)),
    )
    .with_failure_label(spec.failure_label.clone())
    .with_transforms(river_tx::build_transforms(&spec.transforms, run_started))
}

pub fn build_pipeline<S>(spec: &PipelineSpec, store: S, run_started: DateTime<Utc>) -> Pipeline
where
    S: DocumentStore + 'static,
{
    assemble(spec, build_source(&spec.source), store, run_started)
}

/// Run `spec` against MongoDB and report success.
pub async fn run(spec: &PipelineSpec) -> bool {
    let SinkSpec::Mongo(sink) = &spec.sink;
    let store = MongoStore::new(sink);
    build_pipeline(spec, store, Utc::now()).run_reporting().await
}

/// Run `spec` against an in-memory store and return what would have been written.
pub async fn dry_run(spec: &PipelineSpec) -> (bool, Vec<Document>) {
    let store = MemoryStore::new();
    let succeeded = build_pipeline(spec, store.clone(), Utc::now())
        .run_reporting()
        .await;
    let documents = store.documents().await;
    info!(pipeline = %spec.name, documents = documents.len(), "dry run finished");
    (succeeded, documents)
}

pub async fn process_river_geography(config: &PipelineConfig) -> bool {
    run(&river_geography_spec(config)).await
}

pub async fn process_schemes(config: &PipelineConfig) -> bool {
    run(&gov_schemes_spec(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn geography_indexes_geometry_and_writes_per_record() {
        let spec = river_geography_spec(&PipelineConfig::new("rivers.shp", "mongodb://db"));
        let SinkSpec::Mongo(sink) = &spec.sink;
        assert_eq!(sink.database, "river_db");
        assert_eq!(sink.collection, "river_geography");
        assert_eq!(sink.geo_index.as_deref(), Some("geometry"));
        assert_eq!(sink.write_mode, WriteMode::PerRecord);
        assert_eq!(
            spec.transforms.iter().map(TransformSpec::id).collect::<Vec<_>>(),
            vec!["select-columns", "length-km", "simplify-geometry"]
        );
    }

    #[test]
    fn schemes_use_bulk_writes_without_index() {
        let spec = gov_schemes_spec(
            &PipelineConfig::new("schemes.csv", "mongodb://db").with_database("staging"),
        );
        let SinkSpec::Mongo(sink) = &spec.sink;
        assert_eq!(sink.database, "staging");
        assert_eq!(sink.key, "Scheme Name");
        assert_eq!(sink.geo_index, None);
        assert_eq!(sink.write_mode, WriteMode::Bulk);
        assert_eq!(spec.failure_label, "Scheme processing failed");
    }

    #[test]
    fn missing_pipeline_file_is_a_read_error() {
        let err = load_pipeline(Path::new("/no/such/pipeline.yaml"), "").unwrap_err();
        assert!(matches!(err, PipelineError::FileRead(msg) if msg.contains("pipeline.yaml")));
    }

    #[test]
    fn pipeline_file_takes_uri_from_caller() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
name: "schemes"
record_label: "scheme"
source:
  type: file_csv
  id: "csv"
  path: "schemes.csv"
sink:
  type: mongo
  id: "mongo"
  collection: "gov_schemes"
  key: "Scheme Name"
"#
        )
        .unwrap();

        let mut spec = load_pipeline(file.path(), "mongodb://db").unwrap();
        assert_eq!(spec.mongo_sink_mut().uri, "mongodb://db");
        assert_eq!(spec.failure_label, "Processing failed");
    }

    #[test]
    fn malformed_pipeline_file_is_a_schema_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: [unterminated").unwrap();
        let err = load_pipeline(file.path(), "").unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation(_)));
    }
}
