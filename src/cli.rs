use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "raito")]
#[command(about = "Raito self-hosted scraping service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Raito API service and its embedded worker pool.
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Path to the TOML config file. Falls back to `RAITO_CONFIG`, then
    /// `config/raito.toml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
