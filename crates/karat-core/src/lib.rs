#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod connection;
pub mod error;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use config::{ConfigResolver, SupervisorConfig, generate_password};
pub use connection::ConnectionConfig;
pub use error::{SupervisorError, SupervisorResult};
pub use ports::{DatabaseServer, ServerState};
pub use settings::{
    DEFAULT_DATABASE_NAME, DEFAULT_POSTGRES_PORT, POSTGRES_HOST, POSTGRES_SUPERUSER,
    SettingsError, SupervisorSettings, validate_settings,
};

// Re-export path utilities
pub use paths::{PathError, ResolvedPaths, data_root, postgres_bin_dir, postgres_data_dir, resource_root};

// Dev-dependencies used only by integration tests
#[cfg(test)]
use tempfile as _;
