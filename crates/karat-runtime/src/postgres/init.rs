//! One-time bootstrap of the PostgreSQL data directory.
//!
//! The superuser password reaches `initdb` through a credential file written
//! next to the data directory. The file is removed as soon as `initdb` exits,
//! whatever the outcome, and a drop guard covers early returns and panics.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use karat_core::paths::credential_file_path;
use karat_core::{SupervisorConfig, SupervisorError};
use tracing::{debug, error, info, warn};

use super::{PostgresBinaries, initdb_command};

/// Initialize the data directory if it does not exist yet.
///
/// Returns `true` if bootstrap ran. An existing directory is never touched.
pub async fn ensure_initialized(
    config: &SupervisorConfig,
    binaries: &PostgresBinaries,
) -> Result<bool, SupervisorError> {
    if config.data_directory.exists() {
        debug!(
            data_dir = %config.data_directory.display(),
            "Data directory present, skipping bootstrap"
        );
        return Ok(false);
    }

    initialize_data_directory(config, binaries).await?;
    Ok(true)
}

/// Run `initdb` against an absent data directory.
///
/// # Errors
///
/// - `AlreadyInitialized` if the directory exists (the tool is not run)
/// - `Spawn` if `initdb` cannot be started
/// - `Initialization` with captured stdout/stderr on a non-zero exit
pub async fn initialize_data_directory(
    config: &SupervisorConfig,
    binaries: &PostgresBinaries,
) -> Result<(), SupervisorError> {
    let data_dir = &config.data_directory;
    if data_dir.exists() {
        return Err(SupervisorError::AlreadyInitialized {
            path: data_dir.clone(),
        });
    }

    if let Some(parent) = data_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    info!(data_dir = %data_dir.display(), "Initializing PostgreSQL data directory");

    let pwfile = CredentialFile::write(credential_file_path(data_dir), &config.server_password)?;
    let result = initdb_command(binaries, config, pwfile.path()).output().await;
    pwfile.remove();

    let output = result.map_err(|source| SupervisorError::Spawn {
        binary: binaries.initdb.clone(),
        source,
    })?;

    if output.status.success() {
        info!(data_dir = %data_dir.display(), "Data directory initialized");
        return Ok(());
    }

    let captured = combine_output(&output.stdout, &output.stderr);
    error!(code = ?output.status.code(), output = %captured, "initdb failed");
    Err(SupervisorError::Initialization {
        code: output.status.code(),
        output: captured,
    })
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_string(),
        (out, "") => out.to_string(),
        (out, err) => format!("{out}\n{err}"),
    }
}

/// Transient password file, removed on `remove()` or drop.
struct CredentialFile {
    path: PathBuf,
    removed: bool,
}

impl CredentialFile {
    /// Write `password` to a fresh owner-only file at `path`.
    fn write(path: PathBuf, password: &str) -> io::Result<Self> {
        // A leftover from a crashed bootstrap may have looser permissions
        remove_if_present(&path)?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path)?;
        let guard = Self {
            path,
            removed: false,
        };
        writeln!(file, "{password}")?;
        file.sync_all()?;

        Ok(guard)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn remove(mut self) {
        self.remove_now();
    }

    fn remove_now(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = remove_if_present(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove credential file");
        }
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        self.remove_now();
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
