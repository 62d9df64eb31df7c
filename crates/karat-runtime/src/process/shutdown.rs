//! Signal helpers for forced termination.
//!
//! Graceful shutdown goes through `pg_ctl`; these are the fallbacks used when
//! the control tool cannot be spawned (SIGTERM) or when the deadline passes
//! (SIGKILL, delivered through the child handle by the exit monitor).

use std::io;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Send SIGTERM to a process. A process that is already gone is not an error.
///
/// # Platform behavior
/// - Unix: SIGTERM via nix
/// - Windows: unsupported; callers fall back to killing through the child handle
pub fn send_terminate(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        let pid = to_nix_pid(pid)?;
        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "SIGTERM is not available on this platform",
        ))
    }
}

/// Check whether a process with this PID exists.
///
/// Uses the null signal on Unix; `EPERM` still means the process exists.
/// Always `false` on other platforms.
pub fn pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = to_nix_pid(pid) else {
            return false;
        };
        matches!(signal::kill(pid, None), Ok(()) | Err(Errno::EPERM))
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

#[cfg(unix)]
fn to_nix_pid(pid: u32) -> io::Result<Pid> {
    // 0 and negative values address process groups, never a single process
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid pid {pid}"),
        )),
    }
}
