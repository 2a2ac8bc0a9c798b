//! # River I/O - Source and Sink Implementations
//!
//! Concrete operators for the river-etl pipelines.
//!
//! ## Features
//!
//! ### Data Sources
//! - **CSV**: whole-file reads with per-column type inference
//! - **Shapefile**: geometry plus dBASE attributes
//!
//! ### Data Sinks
//! - **DocumentSink**: natural-key upserts into any [`DocumentStore`]
//! - **MongoStore**: the production store
//! - **MemoryStore**: in-process store for dry runs and tests
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use river_core::{MongoSinkSpec, WriteMode};
//! use river_io::sink_document::DocumentSink;
//! use river_io::store_mongo::MongoStore;
//!
//! let spec = MongoSinkSpec {
//!     id: "river-geography".to_string(),
//!     uri: "mongodb://localhost:27017".to_string(),
//!     database: "river_db".to_string(),
//!     collection: "river_geography".to_string(),
//!     key: "name".to_string(),
//!     geo_index: Some("geometry".to_string()),
//!     write_mode: WriteMode::PerRecord,
//! };
//! let sink = DocumentSink::new(&spec, MongoStore::new(&spec));
//! ```

/// Frame to BSON conversion, including GeoJSON geometry encoding
pub mod document;

/// Natural-key upsert sink and the store abstraction behind it
pub mod sink_document;

/// CSV file source implementation
pub mod source_csv;

/// ESRI shapefile source implementation
pub mod source_shapefile;

/// In-memory document store
pub mod store_memory;

/// MongoDB document store
pub mod store_mongo;

pub use mongodb::bson;
pub use sink_document::{DocumentSink, DocumentStore};
pub use store_memory::MemoryStore;
pub use store_mongo::MongoStore;
