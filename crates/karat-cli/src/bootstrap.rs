//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where the supervisor is constructed for the
//! CLI adapter. Command handlers receive the composed `CliContext`.

use std::sync::Arc;

use karat_core::{
    ConfigResolver, DatabaseServer, ResolvedPaths, SupervisorSettings, validate_settings,
};
use karat_runtime::{EmbeddedPostgres, SupervisorTimeouts};
use tracing::debug;

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Settings overlaid on the built-in defaults.
    pub settings: SupervisorSettings,
    /// Supervisor timers.
    pub timeouts: SupervisorTimeouts,
}

impl CliConfig {
    /// Build config from parsed arguments (flags or their env fallbacks).
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let overrides = SupervisorSettings {
            port: cli.port,
            database_name: cli.database.clone(),
        };
        let settings = SupervisorSettings::with_defaults().merge(overrides);
        validate_settings(&settings)?;

        Ok(Self {
            settings,
            timeouts: SupervisorTimeouts::default(),
        })
    }
}

/// Composed context for CLI commands.
pub struct CliContext {
    /// Path and config resolver shared with the supervisor.
    pub resolver: Arc<ConfigResolver>,
    /// The one supervisor instance for this process.
    pub postgres: Arc<EmbeddedPostgres>,
}

impl CliContext {
    pub fn paths(&self) -> &ResolvedPaths {
        self.resolver.paths()
    }

    pub fn postgres(&self) -> &EmbeddedPostgres {
        &self.postgres
    }

    /// The supervisor behind the `DatabaseServer` port.
    pub fn server(&self) -> Arc<dyn DatabaseServer> {
        Arc::clone(&self.postgres) as Arc<dyn DatabaseServer>
    }
}

/// Bootstrap the CLI application.
///
/// Resolves paths (creating the data root if needed) and constructs the
/// supervisor. Nothing is spawned here.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let resolver = Arc::new(ConfigResolver::from_environment(config.settings)?);
    debug!(
        data_root = %resolver.paths().data_root.display(),
        resource_root = %resolver.paths().resource_root.display(),
        "Resolved paths"
    );

    let postgres =
        EmbeddedPostgres::new(Arc::clone(&resolver)).with_timeouts(config.timeouts);

    Ok(CliContext {
        resolver,
        postgres: Arc::new(postgres),
    })
}
