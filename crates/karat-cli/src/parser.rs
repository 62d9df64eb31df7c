//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the embedded database server.
///
/// Global options override the built-in settings and fall back to the
/// `KARAT_PG_PORT` and `KARAT_DB_NAME` environment variables.
#[derive(Parser, Debug)]
#[command(name = "karat-db")]
#[command(about = "Run the embedded PostgreSQL server of the Karat ERP")]
#[command(version)]
pub struct Cli {
    /// Port for the embedded server
    #[arg(long, env = "KARAT_PG_PORT", global = true)]
    pub port: Option<u16>,

    /// Application database name used in the connection string
    #[arg(long, env = "KARAT_DB_NAME", global = true)]
    pub database: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
