//! Settings domain types and validation.
//!
//! These are the user-adjustable knobs of the embedded server. Every field is
//! optional so partial configuration (environment, CLI flags) layers cleanly
//! over the built-in defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default port for the embedded server.
///
/// Deliberately not 5432 so a system-installed PostgreSQL keeps its port.
pub const DEFAULT_POSTGRES_PORT: u16 = 54320;

/// Default application database name.
pub const DEFAULT_DATABASE_NAME: &str = "karat_erp";

/// Superuser created by the bootstrap step.
pub const POSTGRES_SUPERUSER: &str = "postgres";

/// Host the server binds to and clients connect to.
pub const POSTGRES_HOST: &str = "localhost";

/// Embedded server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Port for the embedded server.
    pub port: Option<u16>,

    /// Name of the application database exposed in the connection string.
    pub database_name: Option<String>,
}

impl SupervisorSettings {
    /// Create settings with the built-in defaults filled in.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            port: Some(DEFAULT_POSTGRES_PORT),
            database_name: Some(DEFAULT_DATABASE_NAME.to_string()),
        }
    }

    /// Get the effective port (with default fallback).
    #[must_use]
    pub const fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None => DEFAULT_POSTGRES_PORT,
        }
    }

    /// Get the effective database name (with default fallback).
    #[must_use]
    pub fn effective_database_name(&self) -> &str {
        self.database_name
            .as_deref()
            .unwrap_or(DEFAULT_DATABASE_NAME)
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            port: other.port.or(self.port),
            database_name: other.database_name.or(self.database_name),
        }
    }
}

/// Errors that can occur during settings validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Port {0} is a privileged port. Please use a port >= 1024.")]
    PrivilegedPort(u16),

    #[error("Database name cannot be empty")]
    EmptyDatabaseName,

    #[error("Database name '{0}' may only contain ASCII letters, digits and underscores")]
    InvalidDatabaseName(String),

    #[error("Database name '{0}' exceeds 63 bytes")]
    DatabaseNameTooLong(String),
}

/// Validate settings before they reach the resolver.
pub fn validate_settings(settings: &SupervisorSettings) -> Result<(), SettingsError> {
    if let Some(port) = settings.port
        && port < 1024
    {
        return Err(SettingsError::PrivilegedPort(port));
    }

    if let Some(name) = &settings.database_name {
        if name.is_empty() {
            return Err(SettingsError::EmptyDatabaseName);
        }
        // NAMEDATALEN - 1
        if name.len() > 63 {
            return Err(SettingsError::DatabaseNameTooLong(name.clone()));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SettingsError::InvalidDatabaseName(name.clone()));
        }
    }

    Ok(())
}
