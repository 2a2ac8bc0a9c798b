use anyhow::Result;
use clap::Parser;
use river_core::{PipelineConfig, DEFAULT_DATABASE};
use river_io::bson::Bson;
use river_jobs::{river_geography_spec, GEOGRAPHY_COLLECTION};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// River geography loader
///
/// Reads a river shapefile, keeps name, length and basin, simplifies the
/// geometry and upserts one document per river into MongoDB.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline YAML replacing the built-in pipeline definition
    #[arg(short, long)]
    pipeline: Option<PathBuf>,

    /// Path to the river shapefile (.shp)
    #[arg(long, env = "SHAPEFILE_PATH")]
    shapefile: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long, env = "MONGO_URI", hide_env_values = true)]
    mongo_uri: Option<String>,

    /// Target database
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Target collection
    #[arg(long, default_value = GEOGRAPHY_COLLECTION)]
    collection: String,

    /// Skip creating the 2dsphere index on geometry
    #[arg(long)]
    no_geo_index: bool,

    /// Run against an in-memory store and print the documents instead of writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    let args = Args::parse();

    if process(args).await {
        println!("River geography processing completed successfully");
    } else {
        println!("Processing failed - check logs");
    }
    Ok(())
}

async fn process(args: Args) -> bool {
    let spec = match args.pipeline {
        Some(path) => {
            let uri = args.mongo_uri.unwrap_or_default();
            match river_jobs::load_pipeline(&path, &uri) {
                Ok(spec) => spec,
                Err(e) => {
                    error!(kind = e.kind(), "Processing failed: {e}");
                    return false;
                }
            }
        }
        None => {
            let Some(shapefile) = args.shapefile else {
                error!("Processing failed: SHAPEFILE_PATH is not set");
                return false;
            };
            let config = PipelineConfig::new(shapefile, args.mongo_uri.unwrap_or_default())
                .with_database(args.database);

            let mut spec = river_geography_spec(&config);
            let sink = spec.mongo_sink_mut();
            sink.collection = args.collection;
            if args.no_geo_index {
                sink.geo_index = None;
            }
            spec
        }
    };

    if args.dry_run {
        let (succeeded, documents) = river_jobs::dry_run(&spec).await;
        for document in documents {
            println!("{}", Bson::Document(document).into_relaxed_extjson());
        }
        return succeeded;
    }
    river_jobs::run(&spec).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_pipeline_file_reports_failure() {
        let args = Args::try_parse_from([
            "river-geography",
            "--pipeline",
            "/no/such/pipeline.yaml",
            "--dry-run",
        ])
        .unwrap();
        assert!(!process(args).await);
    }
}
