use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use latency_trends::cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    cli::run(args)
}
