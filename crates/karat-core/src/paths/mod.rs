//! Path utilities for the embedded server's data and binary directories.
//!
//! This module provides the canonical path resolution for all Karat components:
//! - Application data root (holds `postgres-data`)
//! - Resource root (holds the bundled `postgres/bin`)
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O - adapters handle presentation separately
//! - OS-specific logic is kept private in `platform`

mod error;
mod platform;
mod postgres;
mod resolver;

#[cfg(test)]
pub(crate) mod test_utils;

// Error type
pub use error::PathError;

// Platform detection and roots
pub use platform::{data_root, is_packaged_layout, resource_root};

// PostgreSQL layout
pub use postgres::{
    POSTGRES_DATA_DIR_NAME, credential_file_path, executable_name, postgres_bin_dir,
    postgres_data_dir,
};

// Pure resolver for testing and CLI
pub use resolver::ResolvedPaths;
