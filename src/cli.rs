use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Device to check (e.g. /dev/sdb)
    pub device: String,

    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Checkpoint file (overrides config when set)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Scanner binary (overrides config when set)
    #[arg(long)]
    pub badblocks: Option<PathBuf>,

    /// Ignore a stored interruption and check the whole device
    #[arg(long)]
    pub fresh: bool,

    /// Print the stored state for the device and exit
    #[arg(long, conflicts_with = "fresh")]
    pub status: bool,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
