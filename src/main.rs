use bucket_routing::run_catchment;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Route water through the bucket networks of a catchment data folder
#[derive(Parser, Debug)]
#[command(name = "bucket_routing")]
struct Args {
    /// Folder holding generated_catchment.json, ModelTimeSeries.json and the input series
    #[arg(default_value = "testData")]
    data_folder: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run_catchment(&args.data_folder) {
        error!(folder = %args.data_folder.display(), error = %e, "Could not load configuration");
        std::process::exit(1);
    }
}
