//! Subcommand definitions.

use clap::Subcommand;

/// Top-level commands for `karat-db`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the resolved data and resource paths
    Paths,

    /// Verify that postgres, initdb and pg_ctl are bundled and executable
    Check,

    /// Bootstrap the data directory if it does not exist yet
    Init,

    /// Start the server and keep it running until Ctrl-C
    Run {
        /// Print the connection string with the password instead of masking it
        #[arg(long)]
        show_password: bool,
    },
}
