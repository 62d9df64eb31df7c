//! PostgreSQL-specific pieces: the bundled binaries, their command lines,
//! data-directory bootstrap and recovery of servers left by a crashed run.

mod binaries;
mod commands;
mod init;
mod orphan;

pub use binaries::{PostgresBinaries, validate_binaries};
pub use commands::{control_stop_command, initdb_command, server_command};
pub use init::{ensure_initialized, initialize_data_directory};
pub use orphan::{is_postgres_process, read_postmaster_pid, recover_orphaned_server};
