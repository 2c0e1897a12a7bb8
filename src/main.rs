use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use district_atlas::cli::{Cli, Commands};
use district_atlas::commands::{build, lookup, stats};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match &cli.command {
        Commands::Build(args) => build(args),
        Commands::Lookup(args) => lookup(args),
        Commands::Stats(args) => stats(args),
    }
}
