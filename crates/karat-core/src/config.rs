//! Embedded server configuration and its one-time resolver.
//!
//! `SupervisorConfig` is computed once per `ConfigResolver` and never changes
//! afterwards. The password is freshly generated for every resolver and only
//! ever lives in memory (plus the transient bootstrap credential file).

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

use crate::connection::ConnectionConfig;
use crate::paths::{PathError, ResolvedPaths};
use crate::settings::{POSTGRES_HOST, POSTGRES_SUPERUSER, SupervisorSettings};

/// Number of random bytes in a generated password (hex-encoded to 32 chars).
const PASSWORD_BYTES: usize = 16;

/// Resolved configuration for the embedded server.
#[derive(Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Port the server listens on (loopback only).
    pub server_port: u16,
    /// PostgreSQL data directory.
    pub data_directory: PathBuf,
    /// Directory holding the bundled executables.
    pub binary_directory: PathBuf,
    /// Superuser password set at bootstrap.
    pub server_password: String,
    /// Application database name.
    pub database_name: String,
}

impl SupervisorConfig {
    /// Connection parameters for this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: POSTGRES_HOST.to_string(),
            port: self.server_port,
            database: self.database_name.clone(),
            username: POSTGRES_SUPERUSER.to_string(),
            password: self.server_password.clone(),
        }
    }
}

impl fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("server_port", &self.server_port)
            .field("data_directory", &self.data_directory)
            .field("binary_directory", &self.binary_directory)
            .field("server_password", &"<redacted>")
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Generate a cryptographically random password (32 lowercase hex chars).
pub fn generate_password() -> String {
    let mut bytes = [0u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Lazily computes the `SupervisorConfig` exactly once.
///
/// Concurrent first callers race safely: `OnceLock` runs the initializer
/// once and every caller observes the same value.
pub struct ConfigResolver {
    paths: ResolvedPaths,
    settings: SupervisorSettings,
    config: OnceLock<SupervisorConfig>,
}

impl ConfigResolver {
    /// Create a resolver over already-resolved paths.
    pub const fn new(paths: ResolvedPaths, settings: SupervisorSettings) -> Self {
        Self {
            paths,
            settings,
            config: OnceLock::new(),
        }
    }

    /// Resolve install paths from the environment and build a resolver.
    pub fn from_environment(settings: SupervisorSettings) -> Result<Self, PathError> {
        Ok(Self::new(ResolvedPaths::resolve()?, settings))
    }

    /// Create a resolver whose configuration is already fixed.
    pub fn with_config(config: SupervisorConfig) -> Self {
        let paths = ResolvedPaths {
            data_root: config
                .data_directory
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default(),
            resource_root: config.binary_directory.clone(),
            postgres_data_dir: config.data_directory.clone(),
            postgres_bin_dir: config.binary_directory.clone(),
            packaged: true,
        };
        Self {
            paths,
            settings: SupervisorSettings {
                port: Some(config.server_port),
                database_name: Some(config.database_name.clone()),
            },
            config: OnceLock::from(config),
        }
    }

    /// Get the configuration, computing it on first access.
    pub fn resolve(&self) -> &SupervisorConfig {
        self.config.get_or_init(|| {
            let config = SupervisorConfig {
                server_port: self.settings.effective_port(),
                data_directory: self.paths.postgres_data_dir.clone(),
                binary_directory: self.paths.postgres_bin_dir.clone(),
                server_password: generate_password(),
                database_name: self.settings.effective_database_name().to_string(),
            };
            debug!(config = ?config, "Resolved embedded server configuration");
            config
        })
    }

    /// Whether `resolve()` has already run.
    pub fn is_resolved(&self) -> bool {
        self.config.get().is_some()
    }

    /// The paths this resolver derives its configuration from.
    pub const fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
