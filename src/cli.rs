use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::config::DEFAULT_TOLERANCE;

/// District lookup CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "district-atlas", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a district store from an NCES EDGE shapefile
    Build(BuildArgs),

    /// Look up the district containing a coordinate
    Lookup(LookupArgs),

    /// Print store and engine statistics
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Input .shp geometry file
    #[arg(value_hint = ValueHint::FilePath)]
    pub shp: PathBuf,

    /// Input .dbf attribute table
    #[arg(value_hint = ValueHint::FilePath)]
    pub dbf: PathBuf,

    /// Output store file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Simplification tolerance in degrees
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Path to a built district store
    #[arg(value_hint = ValueHint::FilePath)]
    pub store: PathBuf,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lng: f64,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Path to a built district store
    #[arg(value_hint = ValueHint::FilePath)]
    pub store: PathBuf,

    /// Also print per-state district counts
    #[arg(long)]
    pub states: bool,
}
