//! Pure path resolver for testing and CLI introspection.

use std::path::PathBuf;

use super::{PathError, data_root, is_packaged_layout, postgres_bin_dir, postgres_data_dir, resource_root};

/// All resolved paths captured in a single struct.
///
/// This is the "golden truth" for path resolution - use it for:
/// - Building a `ConfigResolver`
/// - CLI `karat-db paths` command output
/// - Debugging path resolution issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Root directory for application data
    pub data_root: PathBuf,
    /// Root directory for bundled resources
    pub resource_root: PathBuf,
    /// PostgreSQL data directory (may not exist yet)
    pub postgres_data_dir: PathBuf,
    /// Directory holding `postgres`, `initdb` and `pg_ctl`
    pub postgres_bin_dir: PathBuf,
    /// Whether the packaged (vs source checkout) layout is in use
    pub packaged: bool,
}

impl ResolvedPaths {
    /// Resolve all paths using the current environment.
    pub fn resolve() -> Result<Self, PathError> {
        Ok(Self {
            data_root: data_root()?,
            resource_root: resource_root()?,
            postgres_data_dir: postgres_data_dir()?,
            postgres_bin_dir: postgres_bin_dir()?,
            packaged: is_packaged_layout(),
        })
    }

    /// Build a layout rooted at explicit directories, bypassing the environment.
    pub fn rooted_at(data_root: impl Into<PathBuf>, resource_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        let resource_root = resource_root.into();
        Self {
            postgres_data_dir: data_root.join(super::POSTGRES_DATA_DIR_NAME),
            postgres_bin_dir: resource_root.join("postgres").join("bin"),
            data_root,
            resource_root,
            packaged: true,
        }
    }
}

impl std::fmt::Display for ResolvedPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "data_root = {}", self.data_root.display())?;
        writeln!(f, "resource_root = {}", self.resource_root.display())?;
        writeln!(f, "postgres_data_dir = {}", self.postgres_data_dir.display())?;
        writeln!(f, "postgres_bin_dir = {}", self.postgres_bin_dir.display())?;
        write!(f, "packaged = {}", self.packaged)
    }
}
