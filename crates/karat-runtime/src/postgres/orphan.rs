//! Recovery of a server left running by a previous, crashed run.
//!
//! PostgreSQL writes `postmaster.pid` into the data directory; its first line
//! is the postmaster PID. If that process is still alive and runs our bundled
//! `postgres` binary, it owns the data directory and the port, so we ask the
//! control tool to stop it first. Anything else is a stale file: after a crash
//! or reboot the PID may belong to an unrelated process, which is never
//! signalled. The server cleans up a stale file itself on start.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use karat_core::SupervisorConfig;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use super::{PostgresBinaries, control_stop_command};
use crate::process::shutdown::pid_alive;

const POSTMASTER_PID_FILE: &str = "postmaster.pid";

/// Poll interval while waiting for a stopped orphan to disappear.
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Read the postmaster PID recorded in `data_dir`, if any.
pub fn read_postmaster_pid(data_dir: &Path) -> io::Result<Option<u32>> {
    match fs::read_to_string(data_dir.join(POSTMASTER_PID_FILE)) {
        Ok(content) => Ok(content
            .lines()
            .next()
            .and_then(|line| line.trim().parse::<u32>().ok())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Stop an orphaned server that still holds the data directory.
///
/// Returns `true` if an orphan was found and is gone afterwards. Failures are
/// logged, not returned: if the orphan survives, the new server's own startup
/// error explains why.
pub async fn recover_orphaned_server(
    binaries: &PostgresBinaries,
    config: &SupervisorConfig,
    deadline: Duration,
) -> bool {
    let pid = match read_postmaster_pid(&config.data_directory) {
        Ok(Some(pid)) => pid,
        Ok(None) => return false,
        Err(e) => {
            warn!(error = %e, "Failed to read postmaster.pid");
            return false;
        }
    };

    if !pid_alive(pid) {
        debug!(pid, "postmaster.pid is stale");
        return false;
    }

    if !is_postgres_process(pid, &binaries.postgres) {
        info!(pid, "postmaster.pid names a process that is not our server, leaving it alone");
        return false;
    }

    warn!(pid, "Found PostgreSQL server left by a previous run, stopping it");

    let started = Instant::now();
    let stop = control_stop_command(binaries, &config.data_directory).output();
    match timeout(deadline, stop).await {
        Ok(Ok(output)) if output.status.success() => {
            info!(pid, "Orphaned server stopped");
        }
        Ok(Ok(output)) => {
            warn!(
                pid,
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "pg_ctl could not stop orphaned server"
            );
        }
        Ok(Err(e)) => {
            warn!(pid, error = %e, "Failed to spawn pg_ctl for orphaned server");
        }
        Err(_) => {
            warn!(pid, timeout = ?deadline, "pg_ctl timed out stopping orphaned server");
        }
    }

    wait_for_exit(pid, started + deadline).await
}

/// Poll until `pid` is gone or `until` passes. Returns whether it is gone.
async fn wait_for_exit(pid: u32, until: Instant) -> bool {
    while pid_alive(pid) {
        if Instant::now() >= until {
            return false;
        }
        sleep(EXIT_POLL).await;
    }
    true
}

/// Check whether `pid` runs the `expected` executable.
///
/// # Platform behavior
/// - **Linux**: reads the `/proc/<pid>/exe` symlink
/// - **macOS**: uses `sysinfo` to look up the executable path
/// - **Other**: always `false`
///
/// Returns `false` whenever verification is not possible, so a reused PID is
/// never mistaken for our server.
pub fn is_postgres_process(pid: u32, expected: &Path) -> bool {
    #[cfg(target_os = "linux")]
    {
        let Ok(actual) = fs::read_link(format!("/proc/{pid}/exe")) else {
            return false;
        };
        same_file(&actual, expected)
    }

    #[cfg(target_os = "macos")]
    {
        use sysinfo::{Pid, System};

        let sys = System::new_all();
        let Some(process) = sys.process(Pid::from_u32(pid)) else {
            return false;
        };
        let Some(actual) = process.exe() else {
            return false;
        };
        same_file(actual, expected)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = (pid, expected);
        false
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn same_file(actual: &Path, expected: &Path) -> bool {
    match (actual.canonicalize(), expected.canonicalize()) {
        (Ok(actual), Ok(expected)) => actual == expected,
        _ => false,
    }
}
