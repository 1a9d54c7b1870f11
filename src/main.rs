//! Weaver CLI entry point.

use clap::Parser;

use weaver::cli::Cli;
use weaver::infrastructure::{logging, ConfigLoader};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging comes up before command dispatch so configuration problems
    // are still reported through it. Fall back to defaults when the config
    // itself is broken; the dispatch path will surface the real error.
    let logging_config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .map(|c| c.logging)
    .unwrap_or_default();
    if let Err(err) = logging::init(&logging_config) {
        eprintln!("failed to initialize logging: {err}");
    }

    if let Err(err) = weaver::cli::run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
