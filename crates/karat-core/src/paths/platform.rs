//! Platform-specific path detection and resolution.
//!
//! This module contains private helpers for detecting the runtime layout
//! (source checkout vs packaged install) and resolving platform-appropriate
//! roots. Public API is exposed through sibling modules.

use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::error::PathError;

/// Directory (under either root) that holds bundled resources.
const RESOURCES_DIR_NAME: &str = "resources";

/// Application directory name under the OS user-data area.
const APP_DIR_NAME: &str = "karat";

/// Detect if we are running from the source repository.
///
/// Returns `Some(path)` for debug builds and for release builds whose
/// executable lives inside the checkout (e.g. `target/release`).
/// Returns `None` for a packaged install.
#[allow(clippy::unnecessary_wraps)] // Option is needed for release builds
fn detect_local_repo() -> Option<PathBuf> {
    let repo_root = PathBuf::from(env!("KARAT_REPO_ROOT"));

    #[cfg(debug_assertions)]
    {
        // In debug mode, always assume we want to use the repo we are building from
        Some(repo_root)
    }

    #[cfg(not(debug_assertions))]
    {
        if !repo_root.join("Cargo.toml").exists() {
            return None;
        }

        let exe_path = env::current_exe().ok()?.canonicalize().ok()?;
        let canonical_repo = repo_root.canonicalize().ok()?;
        exe_path.starts_with(&canonical_repo).then_some(repo_root)
    }
}

/// Check if we are running from a packaged install (not from the source repo).
pub fn is_packaged_layout() -> bool {
    detect_local_repo().is_none()
}

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `KARAT_DATA_DIR` environment variable (highest priority)
/// 2. System data directory (e.g., `~/.local/share/karat`)
///
/// The directory is created if it does not exist yet.
pub fn data_root() -> Result<PathBuf, PathError> {
    let root = if let Ok(path) = env::var("KARAT_DATA_DIR") {
        PathBuf::from(path)
    } else {
        dirs::data_local_dir()
            .ok_or(PathError::NoDataDir)?
            .join(APP_DIR_NAME)
    };

    if !root.exists() {
        debug!(path = %root.display(), "Creating data root");
        fs::create_dir_all(&root).map_err(|e| PathError::CreateFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(root)
}

/// Get the root directory for bundled resources (PostgreSQL binaries).
///
/// Resolution order:
/// 1. `KARAT_RESOURCE_DIR` environment variable
/// 2. `<repo>/resources` when running from the source repository
/// 3. `<executable dir>/resources` for a packaged install
pub fn resource_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var("KARAT_RESOURCE_DIR") {
        return Ok(PathBuf::from(path));
    }

    if let Some(repo) = detect_local_repo() {
        return Ok(repo.join(RESOURCES_DIR_NAME));
    }

    let exe = env::current_exe().map_err(|e| PathError::CurrentExe(e.to_string()))?;
    let exe_dir = exe
        .parent()
        .ok_or_else(|| PathError::CurrentExe(format!("{} has no parent", exe.display())))?;

    Ok(exe_dir.join(RESOURCES_DIR_NAME))
}
