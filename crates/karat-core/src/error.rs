//! Error taxonomy for the embedded server lifecycle.
//!
//! Startup-path variants are fatal for the launch and propagate to the
//! composition root. Shutdown never produces one of these: `stop()` absorbs
//! its failures and escalates to forced termination instead.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::paths::PathError;

/// Errors that can occur while preparing or starting the embedded server.
#[derive(Debug, Error)]
pub enum SupervisorError {
    // === Pre-flight ===
    /// A required executable is missing from the binary directory.
    #[error("Required PostgreSQL binary not found: {path}")]
    MissingBinary { path: PathBuf },

    /// A required executable exists but cannot be executed.
    #[error("PostgreSQL binary is not an executable file: {path}")]
    NotExecutable { path: PathBuf },

    // === Bootstrap ===
    /// The data directory already exists; bootstrap only runs against an absent one.
    #[error("Data directory already initialized: {path}")]
    AlreadyInitialized { path: PathBuf },

    /// The bootstrap tool exited unsuccessfully.
    #[error("initdb failed (exit code {}): {output}", display_code(.code))]
    Initialization { code: Option<i32>, output: String },

    // === Startup ===
    /// The readiness phrase did not appear in time.
    #[error("PostgreSQL did not become ready within {timeout:?}. Output:\n{output}")]
    StartupTimeout { timeout: Duration, output: String },

    /// The server exited before it became ready.
    #[error("PostgreSQL exited during startup (exit code {}). Output:\n{output}", display_code(.code))]
    ServerExited { code: Option<i32>, output: String },

    /// The configured port is already bound by another process.
    #[error("Port {0} is already in use")]
    PortInUse(u16),

    /// The OS refused to create a child process.
    #[error("Failed to spawn {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    // === Path & IO ===
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SupervisorError {
    /// Captured process output, for the variants that carry it.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Initialization { output, .. }
            | Self::StartupTimeout { output, .. }
            | Self::ServerExited { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none, killed by signal".to_string(), |c| c.to_string())
}

/// Result type alias for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;
