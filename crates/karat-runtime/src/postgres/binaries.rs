//! Locating and validating the bundled PostgreSQL executables.

use std::path::{Path, PathBuf};

use karat_core::paths::executable_name;
use karat_core::{SupervisorConfig, SupervisorError};
use tracing::debug;

/// Paths of the three executables the supervisor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresBinaries {
    /// Server daemon
    pub postgres: PathBuf,
    /// Bootstrap tool
    pub initdb: PathBuf,
    /// Control tool
    pub pg_ctl: PathBuf,
}

impl PostgresBinaries {
    /// Expected locations under `dir`, with the platform executable suffix.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            postgres: dir.join(executable_name("postgres")),
            initdb: dir.join(executable_name("initdb")),
            pg_ctl: dir.join(executable_name("pg_ctl")),
        }
    }

    /// Daemon, bootstrap tool, control tool - in validation order.
    pub fn all(&self) -> [&Path; 3] {
        [
            self.postgres.as_path(),
            self.initdb.as_path(),
            self.pg_ctl.as_path(),
        ]
    }
}

/// Confirm every required executable exists before anything is spawned.
///
/// Fails on the first problem, naming the exact path. Not retried: a missing
/// binary means a broken install.
pub fn validate_binaries(config: &SupervisorConfig) -> Result<PostgresBinaries, SupervisorError> {
    let binaries = PostgresBinaries::in_dir(&config.binary_directory);

    for path in binaries.all() {
        validate_binary(path)?;
        debug!(path = %path.display(), "Found PostgreSQL binary");
    }

    Ok(binaries)
}

fn validate_binary(path: &Path) -> Result<(), SupervisorError> {
    if !path.exists() {
        return Err(SupervisorError::MissingBinary {
            path: path.to_path_buf(),
        });
    }

    if !path.is_file() {
        return Err(SupervisorError::NotExecutable {
            path: path.to_path_buf(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = path.metadata()?.permissions().mode();
        if mode & 0o111 == 0 {
            return Err(SupervisorError::NotExecutable {
                path: path.to_path_buf(),
            });
        }
    }

    Ok(())
}
