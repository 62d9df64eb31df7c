//! Init command handler: bootstraps the data directory once.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Validate binaries, then run `initdb` if the data directory is absent.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let postgres = ctx.postgres();
    postgres.validate_binaries().map_err(CliError::from)?;

    let data_dir = &postgres.config().data_directory;
    if postgres.ensure_initialized().await.map_err(CliError::from)? {
        println!("Initialized data directory at {}", data_dir.display());
    } else {
        println!("Data directory {} already initialized", data_dir.display());
    }

    Ok(())
}
