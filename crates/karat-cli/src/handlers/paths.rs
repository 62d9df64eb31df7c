//! Paths command handler.
//!
//! Displays all resolved paths for diagnostics and debugging.

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Print resolved paths and server settings in `key = value` format.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let config = ctx.postgres().config();

    print!("{}", ctx.paths());
    println!("postgres_port = {}", config.server_port);
    println!("database_name = {}", config.database_name);
    Ok(())
}
