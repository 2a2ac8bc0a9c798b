use anyhow::Result;
use clap::Parser;
use river_core::{PipelineConfig, DEFAULT_DATABASE};
use river_io::bson::Bson;
use river_jobs::{gov_schemes_spec, SCHEMES_COLLECTION};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Government scheme loader
///
/// Reads the schemes CSV, parses start dates, stamps the run time and bulk
/// upserts one document per scheme into MongoDB.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline YAML replacing the built-in pipeline definition
    #[arg(short, long)]
    pipeline: Option<PathBuf>,

    /// Path to the schemes CSV file
    #[arg(long, env = "SCHEMES_CSV_PATH")]
    csv: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long, env = "MONGO_URI", hide_env_values = true)]
    mongo_uri: Option<String>,

    /// Target database
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Target collection
    #[arg(long, default_value = SCHEMES_COLLECTION)]
    collection: String,

    /// Create a 2dsphere index on this field before writing
    #[arg(long, value_name = "FIELD")]
    geo_index: Option<String>,

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
        println!("Scheme processing completed");
    } else {
        println!("Scheme processing failed");
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
                    error!(kind = e.kind(), "Scheme processing failed: {e}");
                    return false;
                }
            }
        }
        None => {
            let Some(csv) = args.csv else {
                error!("Scheme processing failed: SCHEMES_CSV_PATH is not set");
                return false;
            };
            let config = PipelineConfig::new(csv, args.mongo_uri.unwrap_or_default())
                .with_database(args.database);

            let mut spec = gov_schemes_spec(&config);
            let sink = spec.mongo_sink_mut();
            sink.collection = args.collection;
            sink.geo_index = args.geo_index;
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
            "gov-schemes",
            "--pipeline",
            "/no/such/pipeline.yaml",
            "--dry-run",
        ])
        .unwrap();
        assert!(!process(args).await);
    }
}
