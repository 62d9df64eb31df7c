//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that call the supervisor and format terminal output
//! - Supervisor errors are wrapped in `CliError` so `main` can pick the exit code

pub mod check;
pub mod init;
pub mod paths;
pub mod run;
