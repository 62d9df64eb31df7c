//! PostgreSQL layout: data directory, binary directory and executable names.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::error::PathError;
use super::platform::{data_root, resource_root};

/// Name of the data directory under the data root.
pub const POSTGRES_DATA_DIR_NAME: &str = "postgres-data";

/// Suffix of the transient bootstrap credential file.
const CREDENTIAL_FILE_SUFFIX: &str = ".pwfile";

/// Get the PostgreSQL data directory (`<data_root>/postgres-data`).
///
/// The directory itself is NOT created; its absence is what gates bootstrap.
pub fn postgres_data_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join(POSTGRES_DATA_DIR_NAME))
}

/// Get the directory holding the bundled PostgreSQL executables.
pub fn postgres_bin_dir() -> Result<PathBuf, PathError> {
    Ok(resource_root()?.join("postgres").join("bin"))
}

/// Platform file name for a bundled executable (`initdb` or `initdb.exe`).
pub fn executable_name(base: &str) -> String {
    format!("{base}{}", std::env::consts::EXE_SUFFIX)
}

/// Location of the transient credential file used during bootstrap.
///
/// It sits next to the data directory, never inside it, so `initdb` sees an
/// absent target directory.
pub fn credential_file_path(data_dir: &Path) -> PathBuf {
    let mut name = data_dir
        .file_name()
        .map_or_else(|| OsString::from(POSTGRES_DATA_DIR_NAME), OsString::from);
    name.push(CREDENTIAL_FILE_SUFFIX);
    data_dir.with_file_name(name)
}
