//! decom CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// decom - tear down Cluster API managed clusters
#[derive(Parser, Debug)]
#[command(name = "decom")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete resources
    Delete(commands::delete::DeleteArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Delete(args) => commands::delete::run(args).await,
        }
    }
}
