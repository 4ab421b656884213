//! Command-line interface for fplcup.

mod commands;

use clap::{Parser, Subcommand};

/// fplcup - company Fantasy Premier League competition server
#[derive(Parser)]
#[command(name = "fplcup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Validate configuration and print a summary
    CheckConfig,

    /// Show the points of one FPL entry for a gameweek
    Points {
        /// FPL entry (team) id
        entry_id: i64,
        /// Gameweek, defaults to the current one
        #[arg(long)]
        gw: Option<u32>,
    },
}

pub use commands::*;
