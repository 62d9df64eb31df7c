//! CLI-specific error types and mappings.
//!
//! Maps `SupervisorError` and friends to exit codes and user-facing messages.

use karat_core::{PathError, SettingsError, SupervisorError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or settings validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Broken installation or unresolvable paths.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The data directory could not be bootstrapped.
    #[error("Database error: {0}")]
    Database(String),

    /// The configured port is taken.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The server process could not be started or died.
    #[error("Process error: {0}")]
    Process(String),

    /// IO error (permission denied, disk full, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow `sysexits.h`:
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 69: `EX_UNAVAILABLE`
    /// - 71: `EX_OSERR`
    /// - 73: `EX_CANTCREAT`
    /// - 74: `EX_IOERR`
    /// - 78: `EX_CONFIG`
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Unavailable(_) => 69,
            Self::Process(_) => 71,
            Self::Database(_) => 73,
            Self::Io(_) => 74,
            Self::Config(_) => 78,
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        let message = err.to_string();
        match err {
            SupervisorError::MissingBinary { .. }
            | SupervisorError::NotExecutable { .. }
            | SupervisorError::Path(_) => Self::Config(message),
            SupervisorError::AlreadyInitialized { .. } | SupervisorError::Initialization { .. } => {
                Self::Database(message)
            }
            SupervisorError::PortInUse(_) => Self::Unavailable(message),
            SupervisorError::StartupTimeout { .. }
            | SupervisorError::ServerExited { .. }
            | SupervisorError::Spawn { .. } => Self::Process(message),
            SupervisorError::Io(_) => Self::Io(message),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Arguments(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
