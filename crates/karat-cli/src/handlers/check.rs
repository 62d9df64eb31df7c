//! Check command handler: verifies the bundled installation.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Validate the three binaries and report whether the data directory exists.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let postgres = ctx.postgres();
    let binaries = postgres.validate_binaries().map_err(CliError::from)?;

    for binary in binaries.all() {
        println!("✓ {}", binary.display());
    }

    let data_dir = &postgres.config().data_directory;
    if data_dir.exists() {
        println!("✓ data directory {}", data_dir.display());
    } else {
        println!(
            "- data directory {} not initialized (run `karat-db init`)",
            data_dir.display()
        );
    }

    Ok(())
}
