use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dspace-aip-archiver")]
#[command(about = "Preserve recently changed DSpace items as APTrust bags", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $ARCHIVER_CONFIG or config/archiver.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest, export, bag and upload every changed item
    Run(RunArgs),
    /// Create the handle store and its schema
    InitDb,
    /// Print the noid for a handle, minting one if needed
    Resolve(HandleArgs),
    /// Print the stored record for a handle
    Show(HandleArgs),
    /// Print a fresh noid without recording it
    Mint(MintArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Harvest items changed within the last N days
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "from")]
    pub days: Option<u32>,

    /// Harvest items changed since this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct HandleArgs {
    /// Bare handle, e.g. 10919/8147
    pub handle: String,
}

#[derive(clap::Args, Debug)]
pub struct MintArgs {
    /// Template to mint from instead of the configured one
    #[arg(long)]
    pub template: Option<String>,
}
