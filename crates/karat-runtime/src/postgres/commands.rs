//! Command lines for the three bundled executables.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use karat_core::{POSTGRES_HOST, POSTGRES_SUPERUSER, SupervisorConfig};
use tokio::process::Command;

use super::PostgresBinaries;

/// `postgres -D <dataDir> -p <port> -h localhost` with piped output.
///
/// The child is killed if its handle is dropped without being reaped.
pub fn server_command(binaries: &PostgresBinaries, config: &SupervisorConfig) -> Command {
    let mut cmd = Command::new(&binaries.postgres);
    cmd.arg("-D")
        .arg(&config.data_directory)
        .arg("-p")
        .arg(config.server_port.to_string())
        .arg("-h")
        .arg(POSTGRES_HOST)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// `initdb -D <dataDir> -U postgres --pwfile=<file> --encoding=UTF8 --locale=C --data-checksums`
pub fn initdb_command(
    binaries: &PostgresBinaries,
    config: &SupervisorConfig,
    pwfile: &Path,
) -> Command {
    let mut pwfile_arg = OsString::from("--pwfile=");
    pwfile_arg.push(pwfile);

    let mut cmd = Command::new(&binaries.initdb);
    cmd.arg("-D")
        .arg(&config.data_directory)
        .arg("-U")
        .arg(POSTGRES_SUPERUSER)
        .arg(pwfile_arg)
        .arg("--encoding=UTF8")
        .arg("--locale=C")
        .arg("--data-checksums")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// `pg_ctl stop -D <dataDir> -m fast`
pub fn control_stop_command(binaries: &PostgresBinaries, data_directory: &Path) -> Command {
    let mut cmd = Command::new(&binaries.pg_ctl);
    cmd.arg("stop")
        .arg("-D")
        .arg(data_directory)
        .arg("-m")
        .arg("fast")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}
